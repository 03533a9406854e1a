//! Process execution and output capture for the hook-command gateway.
//!
//! [`process::start`] spawns one configured step and hands back its two output
//! streams and a completion handle. [`fanin::drain`] reads both streams
//! concurrently and forwards every line to a classified sink.
//!
//! # Usage
//!
//! ```rust,no_run
//! use hook_config::ExecStep;
//! use hook_io::{fanin::drain, process::start};
//! use std::path::Path;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let step = ExecStep::new("hello", "echo", vec!["Hello, World!"]);
//! let process = start(&step, Path::new("./scripts"))?;
//!
//! let (out_tx, mut out_rx) = mpsc::channel(16);
//! let (err_tx, _err_rx) = mpsc::channel(16);
//! let (_, outcome) = tokio::join!(
//!     drain(process.stdout, process.stderr, out_tx, err_tx),
//!     process.completion.wait(),
//! );
//!
//! while let Ok(line) = out_rx.try_recv() {
//!     println!("Output: {line}");
//! }
//! println!("Process ended: {outcome}");
//! # Ok(())
//! # }
//! ```

pub mod fanin;
pub mod process;
