pub mod sender;

pub use sender::{AlertSender, LogAlertSender};
