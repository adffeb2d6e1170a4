pub mod health_handlers;
pub mod results_handlers;
