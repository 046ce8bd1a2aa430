pub mod attendance;
pub mod course;
pub mod homework;
pub mod leaderboard;
pub mod season;
pub mod shop;
pub mod typing;
pub mod user;
