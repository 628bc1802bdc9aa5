//! Film-search clause building: optional request parameters become an
//! ordered list of typed predicate clauses plus a sort key. Values ride in
//! the clause variants and bind as parameters when the clauses are turned
//! into a [`Condition`]; no SQL text is ever assembled from user input.

use std::collections::HashSet;

use sea_orm::{
    ColumnTrait, Condition,
    sea_query::{IntoCondition, Query},
};

use crate::{
    entities::{film, film_review},
    error::ApiError,
    models::{AGE_RATINGS, FilmSummary},
};

/// Raw search parameters as they arrive from the caller, before validation.
#[derive(Clone, Debug, Default)]
pub struct FilmSearch {
    pub q: Option<String>,
    pub genre_ids: Vec<i32>,
    pub age_ratings: Vec<String>,
    pub director_id: Option<i32>,
    pub reviewer_id: Option<i32>,
    pub sort_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    /// Case-insensitive substring match against title or description.
    TextMatch(String),
    GenreIn(Vec<i32>),
    AgeRatingIn(Vec<String>),
    DirectorIs(i32),
    /// Film has a review authored by this user.
    ReviewedBy(i32),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortKey {
    AlphabeticalAsc,
    AlphabeticalDesc,
    /// Natural order of the listing; also the default with no sortBy.
    #[default]
    ReleasedAsc,
    ReleasedDesc,
    RatingAsc,
    RatingDesc,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ALPHABETICAL_ASC" => Some(Self::AlphabeticalAsc),
            "ALPHABETICAL_DESC" => Some(Self::AlphabeticalDesc),
            "RELEASED_ASC" => Some(Self::ReleasedAsc),
            "RELEASED_DESC" => Some(Self::ReleasedDesc),
            "RATING_ASC" => Some(Self::RatingAsc),
            "RATING_DESC" => Some(Self::RatingDesc),
            _ => None,
        }
    }

    /// Rating sorts tie-break by film id ascending so the order is
    /// deterministic across equal ratings.
    pub fn apply(self, films: &mut [FilmSummary]) {
        match self {
            Self::AlphabeticalAsc => films.sort_by(|a, b| a.title.cmp(&b.title)),
            Self::AlphabeticalDesc => films.sort_by(|a, b| b.title.cmp(&a.title)),
            Self::ReleasedAsc => {
                films.sort_by(|a, b| {
                    a.release_date.cmp(&b.release_date).then(a.film_id.cmp(&b.film_id))
                });
            },
            Self::ReleasedDesc => {
                films.sort_by(|a, b| {
                    b.release_date.cmp(&a.release_date).then(a.film_id.cmp(&b.film_id))
                });
            },
            Self::RatingAsc => {
                films.sort_by(|a, b| {
                    a.rating.total_cmp(&b.rating).then(a.film_id.cmp(&b.film_id))
                });
            },
            Self::RatingDesc => {
                films.sort_by(|a, b| {
                    b.rating.total_cmp(&a.rating).then(a.film_id.cmp(&b.film_id))
                });
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct FilmQuery {
    pub clauses: Vec<Clause>,
    pub sort: SortKey,
}

impl FilmQuery {
    /// Normalizes and validates raw search parameters. Genre ids are checked
    /// against the reference set up front: one unknown id rejects the whole
    /// request rather than silently dropping the filter.
    pub fn build(search: FilmSearch, known_genres: &HashSet<i32>) -> Result<Self, ApiError> {
        let mut clauses = Vec::new();

        if let Some(q) = search.q {
            clauses.push(Clause::TextMatch(q));
        }
        if !search.genre_ids.is_empty() {
            for id in &search.genre_ids {
                if !known_genres.contains(id) {
                    return Err(ApiError::validation(format!("no genre with id {id}")));
                }
            }
            clauses.push(Clause::GenreIn(search.genre_ids));
        }
        if !search.age_ratings.is_empty() {
            for rating in &search.age_ratings {
                if !AGE_RATINGS.contains(&rating.as_str()) {
                    return Err(ApiError::validation(format!("invalid age rating {rating:?}")));
                }
            }
            clauses.push(Clause::AgeRatingIn(search.age_ratings));
        }
        if let Some(id) = search.director_id {
            clauses.push(Clause::DirectorIs(id));
        }
        if let Some(id) = search.reviewer_id {
            clauses.push(Clause::ReviewedBy(id));
        }

        let sort = match search.sort_by.as_deref() {
            Some(s) => SortKey::parse(s)
                .ok_or_else(|| ApiError::validation(format!("invalid sortBy {s:?}")))?,
            None => SortKey::default(),
        };

        Ok(Self { clauses, sort })
    }

    /// AND-combines the clauses into a parameterized sea-orm condition.
    pub fn to_condition(&self) -> Condition {
        let mut cond = Condition::all();
        for clause in &self.clauses {
            cond = cond.add(match clause {
                Clause::TextMatch(q) => Condition::any()
                    .add(film::Column::Title.contains(q.as_str()))
                    .add(film::Column::Description.contains(q.as_str())),
                Clause::GenreIn(ids) => {
                    film::Column::GenreId.is_in(ids.iter().copied()).into_condition()
                },
                Clause::AgeRatingIn(ratings) => {
                    film::Column::AgeRating.is_in(ratings.iter().cloned()).into_condition()
                },
                Clause::DirectorIs(id) => film::Column::DirectorId.eq(*id).into_condition(),
                Clause::ReviewedBy(id) => film::Column::Id
                    .in_subquery(
                        Query::select()
                            .column(film_review::Column::FilmId)
                            .from(film_review::Entity)
                            .and_where(film_review::Column::UserId.eq(*id))
                            .to_owned(),
                    )
                    .into_condition(),
            });
        }
        cond
    }
}

/// Pagination window. Absent or non-numeric values fall back to
/// (0, full result length).
#[derive(Clone, Copy, Debug, Default)]
pub struct Page {
    pub start: usize,
    pub count: Option<usize>,
}

impl Page {
    pub fn from_raw(start: Option<&str>, count: Option<&str>) -> Self {
        Self {
            start: start.and_then(|s| s.parse().ok()).unwrap_or(0),
            count: count.and_then(|s| s.parse().ok()),
        }
    }
}

/// Slices one page out of the full result and reports the total size of the
/// filtered set, independent of the window.
pub fn paginate<T>(items: Vec<T>, page: Page) -> (Vec<T>, usize) {
    let total = items.len();
    let start = page.start.min(total);
    let end = match page.count {
        Some(count) => start.saturating_add(count).min(total),
        None => total,
    };
    let slice = items.into_iter().skip(start).take(end - start).collect();
    (slice, total)
}
