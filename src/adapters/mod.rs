//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements            | Connects to                 |
//! |---------------|-----------------------|-----------------------------|
//! | `serial`      | Transport             | panel USB tty (raw 8N1)     |
//! |               | CoinValidatorPort     |                             |
//! |               | DisplayPort           |                             |
//! | `call_bridge` | CallBridge            | simulated SIP user agent    |
//! | `audio`       | AudioFeedback         | log output                  |
//! | `log_sink`    | EventSink             | log output                  |
//! | `config_file` | ConfigPort            | JSON config file            |
//! | `state_file`  | StatePort             | key=value state file        |
//! | `console`     | (drives ControlHandle)| stdin, one command per line |

pub mod audio;
pub mod call_bridge;
pub mod config_file;
pub mod console;
pub mod log_sink;
pub mod serial;
pub mod state_file;
