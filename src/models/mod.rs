pub mod card;
pub mod location;
pub mod pickup;
pub mod user;
