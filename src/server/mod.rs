// Server module entry
// Listener setup, the accept loop, and per-connection serving

pub mod connection;
pub mod head_guard;
pub mod listener;
pub mod signal;

// Rust does not allow `loop` as a module name (keyword), use serve_loop instead
#[path = "loop.rs"]
pub mod serve_loop;

// Re-export commonly used items
pub use listener::create_listener;
pub use serve_loop::serve;
pub use signal::shutdown_signal;
