pub mod middleware;
pub mod rest;
pub mod state;
