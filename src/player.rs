use crate::{
    entrant::{
        Entrant,
        PointsError,
    },
    http::{
        PageError,
        PageResult,
    },
    prelude::*,
    tournament,
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct Player {
    pub(crate) id: i64,
    pub(crate) name: String,
}

/// A player's total points across all linked entrants.
pub(crate) struct Rank {
    pub(crate) player: Player,
    pub(crate) points: i32,
}

#[derive(sqlx::FromRow)]
struct RankRow {
    id: i64,
    name: String,
    placement: Option<i32>,
    bracket_reset: Option<bool>,
    placements: Option<Vec<i32>>,
    multiplier: Option<i32>,
}

impl Player {
    pub(crate) async fn all(transaction: &mut Transaction<'_, Postgres>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT id, name FROM players ORDER BY name, id")
            .fetch_all(&mut **transaction).await
    }

    pub(crate) async fn from_id(transaction: &mut Transaction<'_, Postgres>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT id, name FROM players WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **transaction).await
    }

    pub(crate) async fn create(transaction: &mut Transaction<'_, Postgres>, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as("INSERT INTO players (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&mut **transaction).await
    }

    pub(crate) async fn update_name(&mut self, transaction: &mut Transaction<'_, Postgres>, name: String) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE players SET name = $1 WHERE id = $2")
            .bind(&name)
            .bind(self.id)
            .execute(&mut **transaction).await?;
        self.name = name;
        Ok(())
    }

    /// Entrants linked to this player are kept but unlinked.
    pub(crate) async fn delete(self, transaction: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE entrants SET player_id = NULL WHERE player_id = $1")
            .bind(self.id)
            .execute(&mut **transaction).await?;
        sqlx::query("DELETE FROM players WHERE id = $1")
            .bind(self.id)
            .execute(&mut **transaction).await?;
        Ok(())
    }

    /// All players sorted by total points descending. Players without any linked entrants are included with 0 points.
    pub(crate) async fn rankings(transaction: &mut Transaction<'_, Postgres>) -> Result<Vec<Rank>, PointsError> {
        let rows = sqlx::query_as::<_, RankRow>("
            SELECT
                players.id,
                players.name,
                entrants.placement,
                tournaments.bracket_reset,
                tournaments.placements,
                tiers.multiplier
            FROM players
            LEFT OUTER JOIN entrants ON entrants.player_id = players.id
            LEFT OUTER JOIN tournaments ON tournaments.id = entrants.tournament_id
            LEFT OUTER JOIN tiers ON tiers.id = tournaments.tier_id
        ")
            .fetch_all(&mut **transaction).await?;
        let mut ranks = HashMap::<i64, Rank>::default();
        for RankRow { id, name, placement, bracket_reset, placements, multiplier } in rows {
            let rank = ranks.entry(id).or_insert_with(|| Rank { player: Player { id, name }, points: 0 });
            if let (Some(placement), Some(bracket_reset), Some(placements), Some(multiplier)) = (placement, bracket_reset, placements, multiplier) {
                rank.points = rank.points.saturating_add(formula::points(bracket_reset, &placements, multiplier, placement)?);
            }
        }
        Ok(ranks.into_values()
            .sorted_unstable_by(|rank1, rank2| rank2.points.cmp(&rank1.points).then_with(|| rank1.player.name.cmp(&rank2.player.name)))
            .collect())
    }
}

impl ToHtml for Player {
    fn to_html(&self) -> RawHtml<String> {
        html! {
            a(href = uri!(get(self.id))) {
                bdi : &self.name;
            }
        }
    }
}

#[derive(FromForm, CsrfForm)]
pub(crate) struct NameForm {
    #[field(default = String::new())]
    csrf: String,
    name: String,
}

impl NameForm {
    fn validate(&self, ctx: &mut Context<'_>) -> Option<String> {
        let name = self.name.trim();
        if name.is_empty() {
            ctx.push_error(form::Error::validation("The player name must not be empty.").with_name("name"));
            None
        } else {
            Some(name.to_owned())
        }
    }
}

fn name_field(ctx: &Context<'_>, errors: &mut Vec<&form::Error<'_>>, current: Option<&str>) -> RawHtml<String> {
    form_field("name", errors, html! {
        label(for = "name") : "Name:";
        input(type = "text", id = "name", name = "name", value? = ctx.field_value("name").or(current));
    })
}

/// Players with the same number of points share a rank.
fn rank_numbers(ranks: &[Rank]) -> Vec<(usize, &Rank)> {
    let mut numbered = Vec::with_capacity(ranks.len());
    let mut previous = None;
    for (idx, rank) in ranks.iter().enumerate() {
        let number = match previous {
            Some((number, points)) if points == rank.points => number,
            _ => idx + 1,
        };
        previous = Some((number, rank.points));
        numbered.push((number, rank));
    }
    numbered
}

#[rocket::get("/")]
pub(crate) async fn rankings(pool: &State<PgPool>) -> PageResult {
    let mut transaction = pool.begin().await?;
    let ranks = Player::rankings(&mut transaction).await?;
    page(transaction, PageStyle { kind: PageKind::Rankings }, "Tourney Tracker", html! {
        h1 : "Rankings";
        @if ranks.is_empty() {
            p {
                : "No players so far. Import tournaments on the ";
                a(href = uri!(tournament::list)) : "tournaments page";
                : " and link their entrants to players to see rankings.";
            }
        } else {
            table {
                thead {
                    tr {
                        th : "Rank";
                        th : "Player";
                        th : "Points";
                    }
                }
                tbody {
                    @for (rank_number, rank) in rank_numbers(&ranks) {
                        tr {
                            td : rank_number.to_string();
                            td : &rank.player;
                            td : rank.points.to_string();
                        }
                    }
                }
            }
        }
    }).await
}

async fn list_page(mut transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, ctx: Context<'_>) -> PageResult {
    let players = Player::all(&mut transaction).await?;
    let mut errors = ctx.errors().collect_vec();
    page(transaction, PageStyle { kind: PageKind::Players }, "Players — Tourney Tracker", html! {
        h1 : "Players";
        @if players.is_empty() {
            p : "No players so far.";
        } else {
            ul {
                @for player in &players {
                    li : player;
                }
            }
        }
        h2 : "New player";
        : full_form(uri!(create), csrf, name_field(&ctx, &mut errors, None), errors, "Create");
    }).await
}

#[rocket::get("/players")]
pub(crate) async fn list(pool: &State<PgPool>, csrf: Option<CsrfToken>) -> PageResult {
    list_page(pool.begin().await?, csrf.as_ref(), Context::default()).await
}

#[rocket::post("/players/new", data = "<form>")]
pub(crate) async fn create(pool: &State<PgPool>, csrf: Option<CsrfToken>, form: Form<Contextual<'_, NameForm>>) -> Result<RedirectOrContent, PageError> {
    let mut transaction = pool.begin().await?;
    let mut form = form.into_inner();
    form.verify(&csrf);
    if let Some(ref value) = form.value {
        if let Some(name) = value.validate(&mut form.context) {
            let player = Player::create(&mut transaction, &name).await?;
            transaction.commit().await?;
            return Ok(RedirectOrContent::Redirect(Redirect::to(uri!(get(player.id)))))
        }
    }
    Ok(RedirectOrContent::Content(list_page(transaction, csrf.as_ref(), form.context).await?))
}

async fn player_page(mut transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, player: Player, ctx: Context<'_>) -> PageResult {
    let attendance = Entrant::attendance(&mut transaction, player.id).await?;
    let total = attendance.iter().fold(0_i32, |total, record| total.saturating_add(record.points));
    let (delete_errors, delete_button) = button_form(uri!(delete(player.id)), csrf, ctx.errors().collect(), "Delete");
    page(transaction, PageStyle { kind: PageKind::Players }, &format!("{} — Tourney Tracker", player.name), html! {
        h1 {
            bdi : &player.name;
        }
        p {
            : total.to_string();
            : " points from ";
            : attendance.len().to_string();
            @if attendance.len() == 1 {
                : " tournament";
            } else {
                : " tournaments";
            }
        }
        @if !attendance.is_empty() {
            table {
                thead {
                    tr {
                        th : "Tournament";
                        th : "Tier";
                        th : "Entered as";
                        th : "Placement";
                        th : "Points";
                    }
                }
                tbody {
                    @for record in &attendance {
                        tr {
                            td : &record.tournament;
                            td : &record.tournament.tier_name;
                            td : &record.entrant_name;
                            td : record.placement.to_string();
                            td : record.points.to_string();
                        }
                    }
                }
            }
        }
        : delete_errors;
        div(class = "button-row") {
            a(class = "button", href = uri!(edit(player.id))) : "Rename";
            : delete_button;
        }
    }).await
}

#[rocket::get("/players/<id>")]
pub(crate) async fn get(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64) -> Result<RawHtml<String>, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let player = Player::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    Ok(player_page(transaction, csrf.as_ref(), player, Context::default()).await?)
}

async fn edit_page(transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, player: Player, ctx: Context<'_>) -> PageResult {
    let mut errors = ctx.errors().collect_vec();
    page(transaction, PageStyle { kind: PageKind::Players }, &format!("Rename {} — Tourney Tracker", player.name), html! {
        h1 {
            : "Rename ";
            : &player;
        }
        : full_form(uri!(update_name(player.id)), csrf, name_field(&ctx, &mut errors, Some(&player.name)), errors, "Save");
    }).await
}

#[rocket::get("/players/<id>/edit")]
pub(crate) async fn edit(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64) -> Result<RawHtml<String>, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let player = Player::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    Ok(edit_page(transaction, csrf.as_ref(), player, Context::default()).await?)
}

#[rocket::post("/players/<id>/name", data = "<form>")]
pub(crate) async fn update_name(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64, form: Form<Contextual<'_, NameForm>>) -> Result<RedirectOrContent, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let mut player = Player::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    let mut form = form.into_inner();
    form.verify(&csrf);
    if let Some(ref value) = form.value {
        if let Some(name) = value.validate(&mut form.context) {
            player.update_name(&mut transaction, name).await?;
            transaction.commit().await?;
            return Ok(RedirectOrContent::Redirect(Redirect::to(uri!(get(player.id)))))
        }
    }
    Ok(RedirectOrContent::Content(edit_page(transaction, csrf.as_ref(), player, form.context).await?))
}

#[derive(FromForm, CsrfForm)]
pub(crate) struct DeleteForm {
    #[field(default = String::new())]
    csrf: String,
}

#[rocket::post("/players/<id>/delete", data = "<form>")]
pub(crate) async fn delete(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64, form: Form<Contextual<'_, DeleteForm>>) -> Result<RedirectOrContent, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let player = Player::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    let mut form = form.into_inner();
    form.verify(&csrf);
    Ok(if form.value.is_some() {
        log::info!("deleting player {:?}", player.name);
        player.delete(&mut transaction).await?;
        transaction.commit().await?;
        RedirectOrContent::Redirect(Redirect::to(uri!(list)))
    } else {
        RedirectOrContent::Content(player_page(transaction, csrf.as_ref(), player, form.context).await?)
    })
}
