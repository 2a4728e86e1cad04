pub mod extract;
pub mod generation;
pub mod protocol;
pub mod rest;
pub mod session;
pub mod state;
pub mod ws_handler;

// Re-export the handlers so the router can be assembled in one place.
pub use generation::{
    cancel_generation_handler, generation_progress_handler, start_generation_handler,
};
pub use rest::{
    create_module_handler, delete_module_handler, get_module_handler, health_handler,
    list_modules_handler, upload_module_handler,
};
pub use ws_handler::ws_handler;
