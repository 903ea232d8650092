mod connect;

pub use connect::connect_command;
