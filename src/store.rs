use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::Expr,
};

use crate::{
    entities::{film, film_review, genre, user},
    error::ApiResult,
    models::{FilmDetail, FilmSummary, GenreDto, NO_REVIEW_TEXT, ReviewDto, mean_rating},
    query::FilmQuery,
};

fn opt_set<T: Into<sea_orm::Value>>(value: Option<T>) -> ActiveValue<T> {
    match value {
        Some(v) => Set(v),
        None => NotSet,
    }
}

#[derive(Debug)]
pub struct NewFilm {
    pub title: String,
    pub description: String,
    pub release_date: i64,
    pub genre_id: i32,
    pub runtime: Option<i32>,
    pub age_rating: String,
    pub director_id: i32,
}

#[derive(Debug, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Already hashed.
    pub password: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.password.is_none()
    }
}

#[derive(Debug, Default)]
pub struct FilmPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<i64>,
    pub genre_id: Option<i32>,
    pub runtime: Option<i32>,
    pub age_rating: Option<String>,
}

impl FilmPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.release_date.is_none()
            && self.genre_id.is_none()
            && self.runtime.is_none()
            && self.age_rating.is_none()
    }
}

/// All durable state lives behind this collaborator. Uniqueness violations
/// come back as `ApiError::Conflict` via the `DbErr` translation in `error`.
#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    // users

    pub async fn user_by_id(&self, id: i32) -> ApiResult<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    pub async fn user_by_email(&self, email: &str) -> ApiResult<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    pub async fn user_by_token(&self, token: &str) -> ApiResult<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::AuthToken.eq(token))
            .one(&self.db)
            .await?)
    }

    /// Resolves the request credential to a user, if any.
    pub async fn actor_from_token(&self, token: Option<&str>) -> ApiResult<Option<user::Model>> {
        match token {
            Some(token) => self.user_by_token(token).await,
            None => Ok(None),
        }
    }

    pub async fn insert_user(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        password_hash: &str,
    ) -> ApiResult<i32> {
        let model = user::ActiveModel {
            id: NotSet,
            email: Set(email.to_string()),
            first_name: Set(first_name.to_string()),
            last_name: Set(last_name.to_string()),
            password: Set(password_hash.to_string()),
            auth_token: Set(None),
            image_filename: Set(None),
        };
        let res = user::Entity::insert(model).exec(&self.db).await?;
        Ok(res.last_insert_id)
    }

    pub async fn set_auth_token(&self, user_id: i32, token: &str) -> ApiResult<()> {
        let model = user::ActiveModel {
            id: Set(user_id),
            auth_token: Set(Some(token.to_string())),
            ..Default::default()
        };
        user::Entity::update(model).exec(&self.db).await?;
        Ok(())
    }

    /// Clears the session holding this token; false when no session matched.
    pub async fn clear_auth_token(&self, token: &str) -> ApiResult<bool> {
        let res = user::Entity::update_many()
            .col_expr(user::Column::AuthToken, Expr::value(Option::<String>::None))
            .filter(user::Column::AuthToken.eq(token))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn update_user(&self, user_id: i32, patch: UserPatch) -> ApiResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let model = user::ActiveModel {
            id: Set(user_id),
            email: opt_set(patch.email),
            first_name: opt_set(patch.first_name),
            last_name: opt_set(patch.last_name),
            password: opt_set(patch.password),
            ..Default::default()
        };
        user::Entity::update(model).exec(&self.db).await?;
        Ok(())
    }

    pub async fn set_user_image(&self, user_id: i32, filename: Option<&str>) -> ApiResult<()> {
        let model = user::ActiveModel {
            id: Set(user_id),
            image_filename: Set(filename.map(str::to_string)),
            ..Default::default()
        };
        user::Entity::update(model).exec(&self.db).await?;
        Ok(())
    }

    // genres

    pub async fn genres(&self) -> ApiResult<Vec<GenreDto>> {
        let rows = genre::Entity::find().order_by_asc(genre::Column::Id).all(&self.db).await?;
        Ok(rows.into_iter().map(|g| GenreDto { genre_id: g.id, name: g.name }).collect())
    }

    pub async fn genre_ids(&self) -> ApiResult<HashSet<i32>> {
        let rows = genre::Entity::find().all(&self.db).await?;
        Ok(rows.into_iter().map(|g| g.id).collect())
    }

    pub async fn genre_exists(&self, id: i32) -> ApiResult<bool> {
        Ok(genre::Entity::find_by_id(id).one(&self.db).await?.is_some())
    }

    // films

    pub async fn film_by_id(&self, id: i32) -> ApiResult<Option<film::Model>> {
        Ok(film::Entity::find_by_id(id).one(&self.db).await?)
    }

    /// True when another film (excluding `exclude`, if given) holds the title.
    pub async fn title_in_use(&self, title: &str, exclude: Option<i32>) -> ApiResult<bool> {
        let mut query = film::Entity::find().filter(film::Column::Title.eq(title));
        if let Some(id) = exclude {
            query = query.filter(film::Column::Id.ne(id));
        }
        Ok(query.one(&self.db).await?.is_some())
    }

    pub async fn film_has_reviews(&self, film_id: i32) -> ApiResult<bool> {
        let count = film_review::Entity::find()
            .filter(film_review::Column::FilmId.eq(film_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn insert_film(&self, new: NewFilm) -> ApiResult<i32> {
        let model = film::ActiveModel {
            id: NotSet,
            title: Set(new.title),
            description: Set(new.description),
            release_date: Set(new.release_date),
            genre_id: Set(new.genre_id),
            runtime: Set(new.runtime),
            age_rating: Set(new.age_rating),
            director_id: Set(new.director_id),
            image_filename: Set(None),
        };
        let res = film::Entity::insert(model).exec(&self.db).await?;
        Ok(res.last_insert_id)
    }

    pub async fn update_film(&self, film_id: i32, patch: FilmPatch) -> ApiResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let model = film::ActiveModel {
            id: Set(film_id),
            title: opt_set(patch.title),
            description: opt_set(patch.description),
            release_date: opt_set(patch.release_date),
            genre_id: opt_set(patch.genre_id),
            runtime: opt_set(patch.runtime.map(Some)),
            age_rating: opt_set(patch.age_rating),
            ..Default::default()
        };
        film::Entity::update(model).exec(&self.db).await?;
        Ok(())
    }

    pub async fn set_film_image(&self, film_id: i32, filename: Option<&str>) -> ApiResult<()> {
        let model = film::ActiveModel {
            id: Set(film_id),
            image_filename: Set(filename.map(str::to_string)),
            ..Default::default()
        };
        film::Entity::update(model).exec(&self.db).await?;
        Ok(())
    }

    /// Removes the film record and its reviews in one transaction. Blob
    /// cleanup is the caller's concern, and only after this succeeds.
    pub async fn delete_film(&self, film_id: i32) -> ApiResult<()> {
        let txn = self.db.begin().await?;
        film_review::Entity::delete_many()
            .filter(film_review::Column::FilmId.eq(film_id))
            .exec(&txn)
            .await?;
        film::Entity::delete_by_id(film_id).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Runs the built query and projects the full filtered, sorted listing.
    /// Pagination is sliced by the caller so the total count stays visible.
    pub async fn search_films(&self, query: &FilmQuery) -> ApiResult<Vec<FilmSummary>> {
        let rows = film::Entity::find()
            .filter(query.to_condition())
            .find_also_related(user::Entity)
            .all(&self.db)
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|(f, _)| f.id).collect();
        let reviews = film_review::Entity::find()
            .filter(film_review::Column::FilmId.is_in(ids))
            .all(&self.db)
            .await?;
        let mut agg: HashMap<i32, (i64, i64)> = HashMap::new();
        for review in reviews {
            let entry = agg.entry(review.film_id).or_default();
            entry.0 += i64::from(review.rating);
            entry.1 += 1;
        }

        let mut films: Vec<FilmSummary> = rows
            .into_iter()
            .map(|(f, director)| {
                let (sum, count) = agg.get(&f.id).copied().unwrap_or((0, 0));
                let (first_name, last_name) = director
                    .map(|d| (d.first_name, d.last_name))
                    .unwrap_or_default();
                FilmSummary {
                    film_id: f.id,
                    title: f.title,
                    genre_id: f.genre_id,
                    director_id: f.director_id,
                    director_first_name: first_name,
                    director_last_name: last_name,
                    release_date: f.release_date,
                    age_rating: f.age_rating,
                    rating: mean_rating(sum, count),
                }
            })
            .collect();

        query.sort.apply(&mut films);
        Ok(films)
    }

    pub async fn film_detail(&self, film_id: i32) -> ApiResult<Option<FilmDetail>> {
        let Some((f, director)) = film::Entity::find_by_id(film_id)
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let reviews = film_review::Entity::find()
            .filter(film_review::Column::FilmId.eq(film_id))
            .all(&self.db)
            .await?;
        let count = reviews.len() as i64;
        let sum: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
        let (first_name, last_name) =
            director.map(|d| (d.first_name, d.last_name)).unwrap_or_default();

        Ok(Some(FilmDetail {
            film_id: f.id,
            title: f.title,
            description: f.description,
            genre_id: f.genre_id,
            director_id: f.director_id,
            director_first_name: first_name,
            director_last_name: last_name,
            release_date: f.release_date,
            age_rating: f.age_rating,
            runtime: f.runtime,
            rating: mean_rating(sum, count),
            num_reviews: count,
        }))
    }

    // reviews

    pub async fn reviews_for_film(&self, film_id: i32) -> ApiResult<Vec<ReviewDto>> {
        let rows = film_review::Entity::find()
            .filter(film_review::Column::FilmId.eq(film_id))
            .find_also_related(user::Entity)
            .order_by_desc(film_review::Column::Timestamp)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(r, reviewer)| {
                let (first_name, last_name) =
                    reviewer.map(|u| (u.first_name, u.last_name)).unwrap_or_default();
                ReviewDto {
                    reviewer_id: r.user_id,
                    reviewer_first_name: first_name,
                    reviewer_last_name: last_name,
                    rating: r.rating,
                    review: (r.review != NO_REVIEW_TEXT).then_some(r.review),
                    timestamp: r.timestamp,
                }
            })
            .collect())
    }

    pub async fn insert_review(
        &self,
        film_id: i32,
        user_id: i32,
        rating: i32,
        text: Option<String>,
        now: i64,
    ) -> ApiResult<()> {
        let model = film_review::ActiveModel {
            id: NotSet,
            film_id: Set(film_id),
            user_id: Set(user_id),
            rating: Set(rating),
            review: Set(text.unwrap_or_else(|| NO_REVIEW_TEXT.to_string())),
            timestamp: Set(now),
        };
        film_review::Entity::insert(model).exec(&self.db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    use super::*;
    use crate::{
        error::ApiError,
        query::{FilmSearch, Page, paginate},
    };

    const NOW: i64 = 1_750_000_000;

    async fn test_store() -> Store {
        // A single pooled connection, or every checkout would see its own
        // empty in-memory database.
        let mut opts = sea_orm::ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Store::new(db)
    }

    async fn add_user(store: &Store, email: &str, first: &str, last: &str) -> i32 {
        store.insert_user(email, first, last, "hash").await.unwrap()
    }

    async fn add_film(store: &Store, title: &str, director_id: i32, released: i64) -> i32 {
        store
            .insert_film(NewFilm {
                title: title.to_string(),
                description: format!("{title} description"),
                release_date: released,
                genre_id: 1,
                runtime: None,
                age_rating: "G".to_string(),
                director_id,
            })
            .await
            .unwrap()
    }

    async fn search(store: &Store, search: FilmSearch) -> Vec<FilmSummary> {
        let known = store.genre_ids().await.unwrap();
        let query = FilmQuery::build(search, &known).unwrap();
        store.search_films(&query).await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = test_store().await;
        add_user(&store, "a@example.com", "A", "One").await;
        let err = store.insert_user("a@example.com", "B", "Two", "hash").await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn second_review_by_same_user_conflicts_and_leaves_one_row() {
        let store = test_store().await;
        let director = add_user(&store, "d@example.com", "Di", "Rector").await;
        let reviewer = add_user(&store, "r@example.com", "Re", "Viewer").await;
        let film_id = add_film(&store, "Heat", director, NOW - 1000).await;

        store.insert_review(film_id, reviewer, 8, None, NOW).await.unwrap();
        let err = store
            .insert_review(film_id, reviewer, 9, Some("again".to_string()), NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(store.reviews_for_film(film_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rating_is_the_rounded_mean_and_zero_without_reviews() {
        let store = test_store().await;
        let director = add_user(&store, "d@example.com", "Di", "Rector").await;
        let film_id = add_film(&store, "Heat", director, NOW - 1000).await;
        let quiet_id = add_film(&store, "Quiet", director, NOW - 1000).await;

        for (i, rating) in [3, 4, 5].into_iter().enumerate() {
            let reviewer = add_user(&store, &format!("r{i}@example.com"), "Re", "Viewer").await;
            store.insert_review(film_id, reviewer, rating, None, NOW + i as i64).await.unwrap();
        }

        let detail = store.film_detail(film_id).await.unwrap().unwrap();
        assert_eq!(detail.rating, 4.0);
        assert_eq!(detail.num_reviews, 3);
        assert_eq!(detail.director_first_name, "Di");

        let quiet = store.film_detail(quiet_id).await.unwrap().unwrap();
        assert_eq!(quiet.rating, 0.0);
        assert_eq!(quiet.num_reviews, 0);
    }

    #[tokio::test]
    async fn review_text_sentinel_reads_back_as_none() {
        let store = test_store().await;
        let director = add_user(&store, "d@example.com", "Di", "Rector").await;
        let reviewer = add_user(&store, "r@example.com", "Re", "Viewer").await;
        let silent = add_film(&store, "Silent", director, NOW - 1000).await;
        let wordy = add_film(&store, "Wordy", director, NOW - 1000).await;

        store.insert_review(silent, reviewer, 7, None, NOW).await.unwrap();
        store.insert_review(wordy, reviewer, 7, Some("".to_string()), NOW).await.unwrap();

        assert_eq!(store.reviews_for_film(silent).await.unwrap()[0].review, None);
        assert_eq!(
            store.reviews_for_film(wordy).await.unwrap()[0].review,
            Some("".to_string())
        );
    }

    #[tokio::test]
    async fn search_filters_compose() {
        let store = test_store().await;
        let ridley = add_user(&store, "r@example.com", "Ridley", "Scott").await;
        let jane = add_user(&store, "j@example.com", "Jane", "Campion").await;
        let reviewer = add_user(&store, "v@example.com", "Re", "Viewer").await;

        let alien = store
            .insert_film(NewFilm {
                title: "Alien".to_string(),
                description: "In space no one can hear you scream".to_string(),
                release_date: NOW - 3000,
                genre_id: 1,
                runtime: Some(117),
                age_rating: "R16".to_string(),
                director_id: ridley,
            })
            .await
            .unwrap();
        let piano = store
            .insert_film(NewFilm {
                title: "The Piano".to_string(),
                description: "A mute pianist on the coast".to_string(),
                release_date: NOW - 2000,
                genre_id: 7,
                runtime: Some(121),
                age_rating: "M".to_string(),
                director_id: jane,
            })
            .await
            .unwrap();
        store.insert_review(alien, reviewer, 9, None, NOW).await.unwrap();

        let text = search(&store, FilmSearch {
            q: Some("scream".to_string()),
            ..Default::default()
        })
        .await;
        assert_eq!(text.len(), 1);
        assert_eq!(text[0].film_id, alien);
        assert_eq!(text[0].director_first_name, "Ridley");
        assert_eq!(text[0].rating, 9.0);

        let by_genre =
            search(&store, FilmSearch { genre_ids: vec![7], ..Default::default() }).await;
        assert_eq!(by_genre.len(), 1);
        assert_eq!(by_genre[0].film_id, piano);

        let by_director =
            search(&store, FilmSearch { director_id: Some(jane), ..Default::default() }).await;
        assert_eq!(by_director.len(), 1);
        assert_eq!(by_director[0].film_id, piano);

        let by_reviewer =
            search(&store, FilmSearch { reviewer_id: Some(reviewer), ..Default::default() }).await;
        assert_eq!(by_reviewer.len(), 1);
        assert_eq!(by_reviewer[0].film_id, alien);

        let by_rating = search(&store, FilmSearch {
            age_ratings: vec!["M".to_string()],
            ..Default::default()
        })
        .await;
        assert_eq!(by_rating.len(), 1);
        assert_eq!(by_rating[0].film_id, piano);

        let all = search(&store, FilmSearch::default()).await;
        assert_eq!(all.len(), 2);
        // natural order: release date ascending
        assert_eq!(all[0].film_id, alien);
    }

    #[tokio::test]
    async fn search_pagination_keeps_total_count() {
        let store = test_store().await;
        let director = add_user(&store, "d@example.com", "Di", "Rector").await;
        for i in 0..5 {
            add_film(&store, &format!("Film {i}"), director, NOW - 100 + i).await;
        }
        let films = search(&store, FilmSearch::default()).await;
        let (page, total) = paginate(films, Page { start: 3, count: Some(10) });
        assert_eq!(page.len(), 2);
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn title_uniqueness_check_can_exclude_self() {
        let store = test_store().await;
        let director = add_user(&store, "d@example.com", "Di", "Rector").await;
        let film_id = add_film(&store, "Heat", director, NOW + 1000).await;

        assert!(store.title_in_use("Heat", None).await.unwrap());
        assert!(!store.title_in_use("Heat", Some(film_id)).await.unwrap());
        assert!(!store.title_in_use("Cold", None).await.unwrap());
    }

    #[tokio::test]
    async fn auth_token_lifecycle() {
        let store = test_store().await;
        let id = add_user(&store, "a@example.com", "A", "One").await;

        store.set_auth_token(id, "tok").await.unwrap();
        assert_eq!(store.user_by_token("tok").await.unwrap().unwrap().id, id);
        assert!(store.actor_from_token(Some("tok")).await.unwrap().is_some());
        assert!(store.actor_from_token(None).await.unwrap().is_none());

        assert!(store.clear_auth_token("tok").await.unwrap());
        assert!(!store.clear_auth_token("tok").await.unwrap());
        assert!(store.user_by_token("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_film_removes_its_reviews() {
        let store = test_store().await;
        let director = add_user(&store, "d@example.com", "Di", "Rector").await;
        let reviewer = add_user(&store, "r@example.com", "Re", "Viewer").await;
        let film_id = add_film(&store, "Heat", director, NOW - 1000).await;
        store.insert_review(film_id, reviewer, 8, None, NOW).await.unwrap();

        store.delete_film(film_id).await.unwrap();
        assert!(store.film_by_id(film_id).await.unwrap().is_none());
        assert!(store.reviews_for_film(film_id).await.unwrap().is_empty());
        assert!(!store.film_has_reviews(film_id).await.unwrap());
    }
}
