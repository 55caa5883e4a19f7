pub mod common;

mod http_surface;
