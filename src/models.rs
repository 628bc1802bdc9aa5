use serde::{Deserialize, Serialize, Serializer};

/// Closed set of age-rating classifications; films default to TBC.
pub const AGE_RATINGS: [&str; 7] = ["G", "PG", "M", "R13", "R16", "R18", "TBC"];
pub const DEFAULT_AGE_RATING: &str = "TBC";

/// Sentinel stored in place of review text when the reviewer left none.
/// Distinct from an empty string a reviewer could submit on purpose.
pub const NO_REVIEW_TEXT: &str = "NULL";

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}

/// Parses a `YYYY-MM-DD hh:mm:ss` wall-clock string as UTC epoch seconds.
pub fn parse_datetime(s: &str) -> Result<i64, jiff::Error> {
    let dt = jiff::civil::DateTime::strptime(DATETIME_FMT, s)?;
    Ok(dt.to_zoned(jiff::tz::TimeZone::UTC)?.timestamp().as_second())
}

pub fn format_datetime(secs: i64) -> String {
    jiff::Timestamp::from_second(secs)
        .map(|ts| ts.strftime(DATETIME_FMT).to_string())
        .unwrap_or_default()
}

fn serialize_datetime<S: Serializer>(secs: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_datetime(*secs))
}

/// Mean review rating rounded to 2 decimal places; 0 for zero reviews,
/// never absent.
pub fn mean_rating(sum: i64, count: i64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    (sum as f64 / count as f64 * 100.0).round() / 100.0
}

/// List-view projection over the film + director + review-aggregate join.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmSummary {
    pub film_id: i32,
    pub title: String,
    pub genre_id: i32,
    pub director_id: i32,
    pub director_first_name: String,
    pub director_last_name: String,
    #[serde(serialize_with = "serialize_datetime")]
    pub release_date: i64,
    pub age_rating: String,
    pub rating: f64,
}

/// Single-film projection: summary fields plus description, runtime and
/// review count.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmDetail {
    pub film_id: i32,
    pub title: String,
    pub description: String,
    pub genre_id: i32,
    pub director_id: i32,
    pub director_first_name: String,
    pub director_last_name: String,
    #[serde(serialize_with = "serialize_datetime")]
    pub release_date: i64,
    pub age_rating: String,
    pub runtime: Option<i32>,
    pub rating: f64,
    pub num_reviews: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDto {
    pub reviewer_id: i32,
    pub reviewer_first_name: String,
    pub reviewer_last_name: String,
    pub rating: i32,
    pub review: Option<String>,
    #[serde(serialize_with = "serialize_datetime")]
    pub timestamp: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreDto {
    pub genre_id: i32,
    pub name: String,
}

/// Profile view; `email` is present only when the viewer is the owner.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmPage {
    pub films: Vec<FilmSummary>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserBody {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub current_password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFilmBody {
    pub title: String,
    pub description: String,
    pub release_date: Option<String>,
    pub genre_id: i32,
    pub runtime: Option<i32>,
    pub age_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFilmBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<String>,
    pub genre_id: Option<i32>,
    pub runtime: Option<i32>,
    pub age_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostReviewBody {
    pub rating: i32,
    pub review: Option<String>,
}
