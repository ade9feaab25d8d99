pub mod connection;

pub use connection::ClientPhase;
