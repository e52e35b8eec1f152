pub mod app;
pub mod args;
pub mod autocomplete;
pub mod cmdctx;
pub mod config;
pub mod contract_cmds;
pub mod deploy_output;
pub mod deployer;
pub mod doctor;
pub mod error;
pub mod execmeta;
pub mod help_parser;
pub mod history;
pub mod history_cmds;
pub mod inspector;
pub mod interactive;
pub mod logs;
pub mod parse_cmds;
pub mod paths;
pub mod process;
pub mod runlog;
pub mod session;
pub mod settings_cmds;
pub mod state;
pub mod strategy;
pub mod types;
pub mod util;
pub mod validator;
