pub mod dto;
pub mod providers;
pub mod services;
pub mod use_cases;
