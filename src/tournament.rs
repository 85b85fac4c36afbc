use crate::{
    entrant::Entrant,
    http::{
        PageError,
        PageResult,
    },
    import::{
        self,
        Importer,
    },
    prelude::*,
    tier::Tier,
};

/// Name of the unique index on `tournaments.url` in the schema.
const URL_INDEX: &str = "tournaments_url";

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct Tournament {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) bracket_reset: bool,
    /// Unique placements, worst first.
    pub(crate) placements: Vec<i32>,
    pub(crate) tier_id: i64,
}

/// A row in the tournament list.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct Preview {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) tier_name: String,
}

/// A row in a tier's tournament list.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct Name {
    pub(crate) id: i64,
    pub(crate) name: String,
}

impl ToHtml for Preview {
    fn to_html(&self) -> RawHtml<String> {
        html! {
            a(href = uri!(get(self.id))) : &self.name;
        }
    }
}

impl ToHtml for Name {
    fn to_html(&self) -> RawHtml<String> {
        html! {
            a(href = uri!(get(self.id))) : &self.name;
        }
    }
}

impl Tournament {
    /// Most recently imported first.
    pub(crate) async fn previews(transaction: &mut Transaction<'_, Postgres>) -> Result<Vec<Preview>, sqlx::Error> {
        sqlx::query_as("SELECT tournaments.id, tournaments.name, tiers.name AS tier_name FROM tournaments JOIN tiers ON tiers.id = tournaments.tier_id ORDER BY tournaments.id DESC")
            .fetch_all(&mut **transaction).await
    }

    pub(crate) async fn names_by_tier(transaction: &mut Transaction<'_, Postgres>, tier_id: i64) -> Result<Vec<Name>, sqlx::Error> {
        sqlx::query_as("SELECT id, name FROM tournaments WHERE tier_id = $1 ORDER BY id DESC")
            .bind(tier_id)
            .fetch_all(&mut **transaction).await
    }

    pub(crate) async fn from_id(transaction: &mut Transaction<'_, Postgres>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, url, bracket_reset, placements, tier_id FROM tournaments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **transaction).await
    }

    async fn id_by_url(transaction: &mut Transaction<'_, Postgres>, url: &str) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM tournaments WHERE url = $1")
            .bind(url)
            .fetch_optional(&mut **transaction).await
    }

    /// Whether the unique index on tournament URLs rejected an insert.
    fn is_duplicate_url(e: &sqlx::Error) -> bool {
        e.as_database_error().and_then(|e| e.constraint()) == Some(URL_INDEX)
    }

    /// Inserts the tournament along with all of its entrants. Nothing is persisted unless the caller commits the transaction.
    pub(crate) async fn create(transaction: &mut Transaction<'_, Postgres>, imported: &import::Imported, tier_id: i64) -> Result<Self, sqlx::Error> {
        let import::Tournament { name, url, bracket_reset, placements } = &imported.tournament;
        let tournament = sqlx::query_as::<_, Self>("INSERT INTO tournaments (name, url, bracket_reset, placements, tier_id) VALUES ($1, $2, $3, $4, $5) RETURNING id, name, url, bracket_reset, placements, tier_id")
            .bind(name)
            .bind(url)
            .bind(bracket_reset)
            .bind(placements)
            .bind(tier_id)
            .fetch_one(&mut **transaction).await?;
        Entrant::create_all(transaction, tournament.id, &imported.entrants).await?;
        Ok(tournament)
    }

    pub(crate) async fn set_tier(&mut self, transaction: &mut Transaction<'_, Postgres>, tier_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tournaments SET tier_id = $1 WHERE id = $2")
            .bind(tier_id)
            .bind(self.id)
            .execute(&mut **transaction).await?;
        self.tier_id = tier_id;
        Ok(())
    }

    pub(crate) async fn delete(self, transaction: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
        Entrant::delete_for_tournament(transaction, self.id).await?;
        sqlx::query("DELETE FROM tournaments WHERE id = $1")
            .bind(self.id)
            .execute(&mut **transaction).await?;
        Ok(())
    }
}

#[derive(FromForm, CsrfForm)]
pub(crate) struct ImportForm {
    #[field(default = String::new())]
    csrf: String,
    url: String,
}

async fn list_page(mut transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, ctx: Context<'_>) -> PageResult {
    let previews = Tournament::previews(&mut transaction).await?;
    let mut errors = ctx.errors().collect_vec();
    page(transaction, PageStyle { kind: PageKind::Tournaments }, "Tournaments — Tourney Tracker", html! {
        h1 : "Tournaments";
        h2 : "Import";
        : full_form(uri!(import), csrf, html! {
            : form_field("url", &mut errors, html! {
                label(for = "url") : "Tournament URL:";
                input(type = "text", id = "url", name = "url", value? = ctx.field_value("url"), placeholder = "https://challonge.com/… or https://start.gg/tournament/…/event/…");
                label(class = "help") : "(The tournament must be complete. Challonge tournaments and start.gg events are supported.)";
            });
        }, errors, "Import");
        @if previews.is_empty() {
            p : "No tournaments imported so far.";
        } else {
            table {
                thead {
                    tr {
                        th : "Tournament";
                        th : "Tier";
                    }
                }
                tbody {
                    @for preview in &previews {
                        tr {
                            td : preview;
                            td : &preview.tier_name;
                        }
                    }
                }
            }
        }
    }).await
}

#[rocket::get("/tournaments")]
pub(crate) async fn list(pool: &State<PgPool>, csrf: Option<CsrfToken>) -> PageResult {
    list_page(pool.begin().await?, csrf.as_ref(), Context::default()).await
}

#[rocket::post("/tournaments/new", data = "<form>")]
pub(crate) async fn import(pool: &State<PgPool>, config: &State<Config>, importer: &State<Importer>, csrf: Option<CsrfToken>, form: Form<Contextual<'_, ImportForm>>) -> Result<RedirectOrContent, PageError> {
    let mut form = form.into_inner();
    form.verify(&csrf);
    if let Some(ref value) = form.value {
        // fetch before starting the transaction so a slow platform doesn't hold a database connection
        match importer.import(&value.url).await {
            Ok(imported) => {
                let mut transaction = pool.begin().await?;
                if let Some(id) = Tournament::id_by_url(&mut transaction, &imported.tournament.url).await? {
                    form.context.push_error(form::Error::validation(format!("This tournament has already been imported (ID {id}).")).with_name("url"));
                } else if let Some(tier_id) = Tier::default_id(&mut transaction, config.default_tier).await? {
                    match Tournament::create(&mut transaction, &imported, tier_id).await {
                        Ok(tournament) => {
                            transaction.commit().await?;
                            log::info!("imported {:?} from {} with {} entrants", tournament.name, tournament.url, imported.entrants.len());
                            return Ok(RedirectOrContent::Redirect(Redirect::to(uri!(get(tournament.id)))))
                        }
                        // imported concurrently by another request
                        Err(e) if Tournament::is_duplicate_url(&e) => form.context.push_error(form::Error::validation("This tournament has already been imported.").with_name("url")),
                        Err(e) => return Err(e.into()),
                    }
                } else {
                    form.context.push_error(form::Error::validation("There are no tiers to assign the tournament to. Create a tier first.").with_name("url"));
                }
            }
            Err(e) => {
                log::warn!("failed to import tournament from {:?}: {e}", value.url);
                let message = if e.is_network_error() {
                    format!("{e}. Please try again later.")
                } else {
                    e.to_string()
                };
                form.context.push_error(form::Error::validation(message).with_name("url"));
            }
        }
    }
    Ok(RedirectOrContent::Content(list_page(pool.begin().await?, csrf.as_ref(), form.context).await?))
}

async fn tournament_page(mut transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, tournament: Tournament, ctx: Context<'_>) -> PageResult {
    let tier = Tier::for_tournament(&mut transaction, tournament.id).await?;
    let multiplier = tier.as_ref().map_or(1, |tier| tier.multiplier);
    let entrants = Entrant::with_points(&mut transaction, &tournament, multiplier).await?;
    let (delete_errors, delete_button) = button_form(uri!(delete(tournament.id)), csrf, ctx.errors().collect(), "Delete");
    page(transaction, PageStyle { kind: PageKind::Tournaments }, &format!("{} — Tourney Tracker", tournament.name), html! {
        h1 : &tournament.name;
        p {
            a(href = &tournament.url) : &tournament.url;
        }
        p {
            : "Tier: ";
            @if let Some(ref tier) = tier {
                : tier;
            } else {
                : "(none)";
            }
            : " (";
            a(href = uri!(edit_tier(tournament.id))) : "change";
            : ")";
        }
        @if tournament.bracket_reset {
            p : "The runner-up made a bracket reset in the grand final.";
        }
        table {
            thead {
                tr {
                    th : "Placement";
                    th : "Entrant";
                    th : "Points";
                    th : "Player";
                }
            }
            tbody {
                @for (entrant, points) in &entrants {
                    tr {
                        td : entrant.placement.to_string();
                        td : &entrant.name;
                        td : points.to_string();
                        td {
                            @if let Some(player) = entrant.player() {
                                : player;
                                : " ";
                            }
                            a(href = uri!(crate::entrant::edit_player(entrant.id))) {
                                @if entrant.player_id.is_some() {
                                    : "(change)";
                                } else {
                                    : "link player";
                                }
                            }
                        }
                    }
                }
            }
        }
        : delete_errors;
        div(class = "button-row") : delete_button;
    }).await
}

#[rocket::get("/tournaments/<id>")]
pub(crate) async fn get(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64) -> Result<RawHtml<String>, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let tournament = Tournament::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    Ok(tournament_page(transaction, csrf.as_ref(), tournament, Context::default()).await?)
}

#[derive(FromForm, CsrfForm)]
pub(crate) struct TierForm {
    #[field(default = String::new())]
    csrf: String,
    tier: i64,
}

async fn edit_tier_page(mut transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, tournament: Tournament, ctx: Context<'_>) -> PageResult {
    let tiers = Tier::all(&mut transaction).await?;
    let current = tournament.tier_id.to_string();
    let selected = ctx.field_value("tier").unwrap_or(&current);
    let mut errors = ctx.errors().collect_vec();
    page(transaction, PageStyle { kind: PageKind::Tournaments }, &format!("Change tier of {} — Tourney Tracker", tournament.name), html! {
        h1 {
            : "Change tier of ";
            a(href = uri!(get(tournament.id))) : &tournament.name;
        }
        : full_form(uri!(set_tier(tournament.id)), csrf, html! {
            : form_field("tier", &mut errors, html! {
                label(for = "tier") : "Tier:";
                select(id = "tier", name = "tier") {
                    @for tier in &tiers {
                        @let value = tier.id.to_string();
                        option(value = &value, selected? = selected == value) {
                            : &tier.name;
                            : " (×";
                            : tier.multiplier.to_string();
                            : ")";
                        }
                    }
                }
            });
        }, errors, "Save");
    }).await
}

#[rocket::get("/tournaments/<id>/tier/edit")]
pub(crate) async fn edit_tier(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64) -> Result<RawHtml<String>, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let tournament = Tournament::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    Ok(edit_tier_page(transaction, csrf.as_ref(), tournament, Context::default()).await?)
}

#[rocket::post("/tournaments/<id>/tier", data = "<form>")]
pub(crate) async fn set_tier(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64, form: Form<Contextual<'_, TierForm>>) -> Result<RedirectOrContent, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let mut tournament = Tournament::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    let mut form = form.into_inner();
    form.verify(&csrf);
    if let Some(ref value) = form.value {
        if Tier::from_id(&mut transaction, value.tier).await?.is_some() {
            tournament.set_tier(&mut transaction, value.tier).await?;
            transaction.commit().await?;
            return Ok(RedirectOrContent::Redirect(Redirect::to(uri!(get(tournament.id)))))
        }
        form.context.push_error(form::Error::validation("There is no such tier.").with_name("tier"));
    }
    Ok(RedirectOrContent::Content(edit_tier_page(transaction, csrf.as_ref(), tournament, form.context).await?))
}

#[derive(FromForm, CsrfForm)]
pub(crate) struct DeleteForm {
    #[field(default = String::new())]
    csrf: String,
}

#[rocket::post("/tournaments/<id>/delete", data = "<form>")]
pub(crate) async fn delete(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64, form: Form<Contextual<'_, DeleteForm>>) -> Result<RedirectOrContent, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let tournament = Tournament::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    let mut form = form.into_inner();
    form.verify(&csrf);
    Ok(if form.value.is_some() {
        log::info!("deleting tournament {:?}", tournament.name);
        tournament.delete(&mut transaction).await?;
        transaction.commit().await?;
        RedirectOrContent::Redirect(Redirect::to(uri!(list)))
    } else {
        RedirectOrContent::Content(tournament_page(transaction, csrf.as_ref(), tournament, form.context).await?)
    })
}

#[cfg(test)]
mod tests {
    use {
        std::error::Error as StdError,
        sqlx::error::{
            DatabaseError,
            ErrorKind,
        },
        super::*,
    };

    #[derive(Debug, thiserror::Error)]
    #[error("duplicate key value violates unique constraint")]
    struct UniqueViolation {
        constraint: &'static str,
    }

    impl DatabaseError for UniqueViolation {
        fn message(&self) -> &str { "duplicate key value violates unique constraint" }
        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) { self }
        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) { self }
        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> { self }
        fn constraint(&self) -> Option<&str> { Some(self.constraint) }
        fn kind(&self) -> ErrorKind { ErrorKind::UniqueViolation }
    }

    #[test]
    fn duplicate_url_detection() {
        assert!(Tournament::is_duplicate_url(&sqlx::Error::Database(Box::new(UniqueViolation { constraint: URL_INDEX }))));
        assert!(!Tournament::is_duplicate_url(&sqlx::Error::Database(Box::new(UniqueViolation { constraint: "tiers_name_key" }))));
        assert!(!Tournament::is_duplicate_url(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn schema_has_url_index() {
        assert!(include_str!("../assets/schema.sql").contains(&format!("CREATE UNIQUE INDEX IF NOT EXISTS {URL_INDEX} ON tournaments (url)")));
    }
}
