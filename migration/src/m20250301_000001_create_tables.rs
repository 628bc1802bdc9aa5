use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

const GENRES: [&str; 18] = [
    "Action",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "History",
    "Horror",
    "Music",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Thriller",
    "War",
    "Western",
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(pk_auto(User::Id))
                    .col(string(User::Email))
                    .col(string(User::FirstName))
                    .col(string(User::LastName))
                    .col(string(User::Password))
                    .col(string_null(User::AuthToken))
                    .col(string_null(User::ImageFilename))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_email_unique")
                    .table(User::Table)
                    .col(User::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_auth_token")
                    .table(User::Table)
                    .col(User::AuthToken)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Genre::Table)
                    .if_not_exists()
                    .col(pk_auto(Genre::Id))
                    .col(string(Genre::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Film::Table)
                    .if_not_exists()
                    .col(pk_auto(Film::Id))
                    .col(string(Film::Title))
                    .col(string(Film::Description))
                    .col(big_integer(Film::ReleaseDate))
                    .col(integer(Film::GenreId))
                    .col(integer_null(Film::Runtime))
                    .col(string(Film::AgeRating))
                    .col(integer(Film::DirectorId))
                    .col(string_null(Film::ImageFilename))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_film_director")
                            .from(Film::Table, Film::DirectorId)
                            .to(User::Table, User::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_film_genre")
                            .from(Film::Table, Film::GenreId)
                            .to(Genre::Table, Genre::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_film_title_unique")
                    .table(Film::Table)
                    .col(Film::Title)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FilmReview::Table)
                    .if_not_exists()
                    .col(pk_auto(FilmReview::Id))
                    .col(integer(FilmReview::FilmId))
                    .col(integer(FilmReview::UserId))
                    .col(integer(FilmReview::Rating))
                    .col(string(FilmReview::Review))
                    .col(big_integer(FilmReview::Timestamp))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_film")
                            .from(FilmReview::Table, FilmReview::FilmId)
                            .to(Film::Table, Film::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_user")
                            .from(FilmReview::Table, FilmReview::UserId)
                            .to(User::Table, User::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One review per (film, user); the duplicate-review race resolves here.
        manager
            .create_index(
                Index::create()
                    .name("idx_film_review_unique")
                    .table(FilmReview::Table)
                    .col(FilmReview::FilmId)
                    .col(FilmReview::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        for name in GENRES {
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(Genre::Table)
                        .columns([Genre::Name])
                        .values_panic([name.into()])
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(FilmReview::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Film::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Genre::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(User::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
    Email,
    FirstName,
    LastName,
    Password,
    AuthToken,
    ImageFilename,
}

#[derive(DeriveIden)]
enum Genre {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Film {
    Table,
    Id,
    Title,
    Description,
    ReleaseDate,
    GenreId,
    Runtime,
    AgeRating,
    DirectorId,
    ImageFilename,
}

#[derive(DeriveIden)]
enum FilmReview {
    Table,
    Id,
    FilmId,
    UserId,
    Rating,
    Timestamp,
    Review,
}
