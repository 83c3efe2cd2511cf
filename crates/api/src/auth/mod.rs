pub mod cron;
pub mod jwt;
