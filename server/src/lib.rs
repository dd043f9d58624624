pub mod api;
pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod protocol;
pub mod recorder;
pub mod recorder_server;
pub mod replay;
pub mod storage;
pub mod supervisor;
pub mod tracker;
pub mod transport;
