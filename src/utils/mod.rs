pub mod download_utils; // Central download utility for robust file downloads
pub mod hash_utils;
pub mod path_utils; // Temp archive naming and filename sanitizing
pub mod updater_utils;
