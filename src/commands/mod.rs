pub mod config_commands;
pub mod install_command;
pub mod preference_commands;
pub mod protocol_commands;
pub mod quick_launch_commands;
pub mod shell_commands;
