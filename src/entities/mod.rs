pub mod film;
pub mod film_review;
pub mod genre;
pub mod user;
