//! Authorization and lifecycle decisions as pure functions over
//! already-fetched state. Handlers do the lookups, capture one `now` value
//! for the whole request, and call in here before touching storage; `Ok(())`
//! means allowed. Nothing in this module performs I/O.

use crate::{
    auth,
    entities::{film, user},
    error::{ApiError, ApiResult},
    images::ImageType,
    models::UserView,
};

fn require<'a>(actor: Option<&'a user::Model>) -> ApiResult<&'a user::Model> {
    actor.ok_or(ApiError::Unauthenticated)
}

/// Any authenticated user may direct a film.
pub fn create_film(actor: Option<&user::Model>) -> ApiResult<()> {
    require(actor)?;
    Ok(())
}

/// Checked in order: film exists, credential valid, film has no reviews,
/// actor is the director.
pub fn edit_film(
    target: Option<&film::Model>,
    actor: Option<&user::Model>,
    has_reviews: bool,
) -> ApiResult<()> {
    let target = target.ok_or(ApiError::NotFound("no film with id"))?;
    let actor = require(actor)?;
    if has_reviews {
        return Err(ApiError::Forbidden("cannot edit a film that has a review placed"));
    }
    if target.director_id != actor.id {
        return Err(ApiError::Forbidden("only the director of a film may change it"));
    }
    Ok(())
}

/// Like [`edit_film`] without the review-count gate.
pub fn delete_film(target: Option<&film::Model>, actor: Option<&user::Model>) -> ApiResult<()> {
    let target = target.ok_or(ApiError::NotFound("no film with id"))?;
    let actor = require(actor)?;
    if target.director_id != actor.id {
        return Err(ApiError::Forbidden("only the director of a film may delete it"));
    }
    Ok(())
}

/// Checked in order: credential valid, film exists, actor is the director and
/// the film is unreviewed, content type is an accepted image type.
pub fn set_film_image(
    actor: Option<&user::Model>,
    target: Option<&film::Model>,
    has_reviews: bool,
    image_type: Option<ImageType>,
) -> ApiResult<ImageType> {
    let actor = require(actor)?;
    let target = target.ok_or(ApiError::NotFound("no film with id"))?;
    if target.director_id != actor.id || has_reviews {
        return Err(ApiError::Forbidden("only the director of a film may change the hero image"));
    }
    image_type.ok_or_else(|| ApiError::validation("image must be png, jpeg or gif"))
}

/// Checked in order: credential valid, film exists, actor is not the
/// director, film has already released at `now`.
pub fn post_review(
    actor: Option<&user::Model>,
    target: Option<&film::Model>,
    now: i64,
) -> ApiResult<()> {
    let actor = require(actor)?;
    let target = target.ok_or(ApiError::NotFound("no film with id"))?;
    if target.director_id == actor.id {
        return Err(ApiError::Forbidden("cannot review your own film"));
    }
    if target.release_date >= now {
        return Err(ApiError::Forbidden("cannot review a film that has not yet released"));
    }
    Ok(())
}

/// Profile image set/delete: credential valid, subject exists, actor is the
/// subject.
pub fn modify_profile_image(
    actor: Option<&user::Model>,
    subject: Option<&user::Model>,
) -> ApiResult<()> {
    let actor = require(actor)?;
    let subject = subject.ok_or(ApiError::NotFound("no user with id"))?;
    if actor.id != subject.id {
        return Err(ApiError::Forbidden("cannot change another user's profile image"));
    }
    Ok(())
}

/// Profile edit: subject exists, credential valid, actor is the subject.
pub fn edit_profile(
    subject: Option<&user::Model>,
    actor: Option<&user::Model>,
) -> ApiResult<()> {
    let subject = subject.ok_or(ApiError::NotFound("no user with id"))?;
    let actor = require(actor)?;
    if actor.id != subject.id {
        return Err(ApiError::Forbidden("this is not your account"));
    }
    Ok(())
}

/// Changing a password requires the current one, which must verify and must
/// differ from the replacement.
pub fn change_password(
    current: Option<&str>,
    new: &str,
    stored_hash: &str,
) -> ApiResult<()> {
    let current = current
        .ok_or_else(|| ApiError::validation("currentPassword is required to change password"))?;
    if !auth::verify_password(current, stored_hash) {
        return Err(ApiError::Unauthenticated);
    }
    if current == new {
        return Err(ApiError::Forbidden("new password must differ from the current one"));
    }
    Ok(())
}

/// Release date at creation: omitted defaults to `now`, unparsable is a bad
/// request, a past moment cannot be scheduled.
pub fn resolve_release_date(provided: Option<&str>, now: i64) -> ApiResult<i64> {
    let Some(provided) = provided else {
        return Ok(now);
    };
    let date = crate::models::parse_datetime(provided)
        .map_err(|_| ApiError::validation(format!("invalid datetime {provided:?}")))?;
    if date < now {
        return Err(ApiError::Forbidden("cannot release a film in the past"));
    }
    Ok(date)
}

/// Release date on edit: cannot move into the past, and cannot change at all
/// once the current date has passed.
pub fn check_release_date_change(new_date: i64, current_date: i64, now: i64) -> ApiResult<()> {
    if new_date < now {
        return Err(ApiError::Forbidden("cannot release a film in the past"));
    }
    if current_date < now {
        return Err(ApiError::Forbidden("cannot change the release date of a released film"));
    }
    Ok(())
}

/// Public profile view; the email is included only for the owner, identified
/// by the presented token matching the stored one.
pub fn profile_view(subject: &user::Model, token: Option<&str>) -> UserView {
    let is_owner = match (&subject.auth_token, token) {
        (Some(stored), Some(presented)) => stored == presented,
        _ => false,
    };
    UserView {
        email: is_owner.then(|| subject.email.clone()),
        first_name: subject.first_name.clone(),
        last_name: subject.last_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i32) -> user::Model {
        user::Model {
            id,
            email: format!("user{id}@example.com"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password: "hash".to_string(),
            auth_token: Some(format!("token-{id}")),
            image_filename: None,
        }
    }

    fn film(id: i32, director_id: i32, release_date: i64) -> film::Model {
        film::Model {
            id,
            title: format!("Film {id}"),
            description: "A film".to_string(),
            release_date,
            genre_id: 1,
            runtime: None,
            age_rating: "TBC".to_string(),
            director_id,
            image_filename: None,
        }
    }

    const NOW: i64 = 1_750_000_000;

    #[test]
    fn create_film_requires_credential_only() {
        assert!(matches!(create_film(None), Err(ApiError::Unauthenticated)));
        assert!(create_film(Some(&user(1))).is_ok());
    }

    #[test]
    fn edit_film_checks_in_order() {
        let director = user(1);
        let stranger = user(2);
        let target = film(10, 1, NOW + 100);

        assert!(matches!(
            edit_film(None, Some(&director), false),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            edit_film(Some(&target), None, false),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            edit_film(Some(&target), Some(&stranger), false),
            Err(ApiError::Forbidden(_))
        ));
        assert!(edit_film(Some(&target), Some(&director), false).is_ok());
    }

    #[test]
    fn reviewed_film_is_locked_for_everyone() {
        let director = user(1);
        let stranger = user(2);
        let target = film(10, 1, NOW - 100);
        assert!(matches!(
            edit_film(Some(&target), Some(&director), true),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            edit_film(Some(&target), Some(&stranger), true),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn delete_film_has_no_review_gate() {
        let director = user(1);
        let target = film(10, 1, NOW - 100);
        assert!(delete_film(Some(&target), Some(&director)).is_ok());
        assert!(matches!(
            delete_film(Some(&target), Some(&user(2))),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(delete_film(Some(&target), None), Err(ApiError::Unauthenticated)));
        assert!(matches!(delete_film(None, Some(&director)), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn hero_image_requires_director_and_no_reviews() {
        let director = user(1);
        let target = film(10, 1, NOW + 100);

        assert!(matches!(
            set_film_image(None, Some(&target), false, Some(ImageType::Png)),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            set_film_image(Some(&director), None, false, Some(ImageType::Png)),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            set_film_image(Some(&user(2)), Some(&target), false, Some(ImageType::Png)),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            set_film_image(Some(&director), Some(&target), true, Some(ImageType::Png)),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            set_film_image(Some(&director), Some(&target), false, None),
            Err(ApiError::Validation(_))
        ));
        assert_eq!(
            set_film_image(Some(&director), Some(&target), false, Some(ImageType::Gif)).unwrap(),
            ImageType::Gif
        );
    }

    #[test]
    fn cannot_review_own_film() {
        let director = user(1);
        let target = film(10, 1, NOW - 100);
        assert!(matches!(
            post_review(Some(&director), Some(&target), NOW),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn cannot_review_unreleased_film() {
        let reviewer = user(2);
        let target = film(10, 1, NOW + 100);
        assert!(matches!(
            post_review(Some(&reviewer), Some(&target), NOW),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn released_film_accepts_review_from_non_director() {
        let reviewer = user(2);
        let target = film(10, 1, NOW - 100);
        assert!(post_review(Some(&reviewer), Some(&target), NOW).is_ok());
    }

    #[test]
    fn profile_image_is_owner_only() {
        let owner = user(1);
        assert!(modify_profile_image(Some(&owner), Some(&owner)).is_ok());
        assert!(matches!(
            modify_profile_image(Some(&user(2)), Some(&owner)),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            modify_profile_image(None, Some(&owner)),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            modify_profile_image(Some(&owner), None),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn release_date_defaults_to_now() {
        assert_eq!(resolve_release_date(None, NOW).unwrap(), NOW);
    }

    #[test]
    fn release_date_cannot_be_in_the_past() {
        let past = crate::models::format_datetime(NOW - 3600);
        assert!(matches!(
            resolve_release_date(Some(&past), NOW),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn unparsable_release_date_is_a_bad_request() {
        assert!(matches!(
            resolve_release_date(Some("next tuesday"), NOW),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn future_release_date_is_accepted() {
        let future = crate::models::format_datetime(NOW + 3600);
        assert_eq!(resolve_release_date(Some(&future), NOW).unwrap(), NOW + 3600);
    }

    #[test]
    fn release_date_is_immutable_once_passed() {
        assert!(matches!(
            check_release_date_change(NOW + 100, NOW - 100, NOW),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            check_release_date_change(NOW - 100, NOW + 100, NOW),
            Err(ApiError::Forbidden(_))
        ));
        assert!(check_release_date_change(NOW + 200, NOW + 100, NOW).is_ok());
    }

    #[test]
    fn profile_view_hides_email_from_others() {
        let subject = user(1);

        let own = profile_view(&subject, subject.auth_token.as_deref());
        assert_eq!(own.email.as_deref(), Some("user1@example.com"));

        let other = profile_view(&subject, Some("token-2"));
        assert!(other.email.is_none());
        assert_eq!(other.first_name, "Test");

        let anonymous = profile_view(&subject, None);
        assert!(anonymous.email.is_none());
    }

    #[test]
    fn password_change_rules() {
        let stored = bcrypt::hash("old-secret", 4).unwrap();
        assert!(matches!(
            change_password(None, "new-secret", &stored),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            change_password(Some("wrong"), "new-secret", &stored),
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            change_password(Some("old-secret"), "old-secret", &stored),
            Err(ApiError::Forbidden(_))
        ));
        assert!(change_password(Some("old-secret"), "new-secret", &stored).is_ok());
    }
}
