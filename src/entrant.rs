use crate::{
    http::PageError,
    import,
    player::Player,
    prelude::*,
    tournament::{
        self,
        Tournament,
    },
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum PointsError {
    #[error(transparent)] Formula(#[from] formula::PlacementNotFound),
    #[error(transparent)] Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct Entrant {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) placement: i32,
    pub(crate) tournament_id: i64,
    pub(crate) player_id: Option<i64>,
    player_name: Option<String>,
}

const SELECT: &str = "SELECT entrants.id, entrants.name, entrants.placement, entrants.tournament_id, entrants.player_id, players.name AS player_name FROM entrants LEFT OUTER JOIN players ON players.id = entrants.player_id";

/// One of a player's tournament results.
pub(crate) struct Attendance {
    pub(crate) tournament: tournament::Preview,
    pub(crate) entrant_name: String,
    pub(crate) placement: i32,
    pub(crate) points: i32,
}

#[derive(sqlx::FromRow)]
struct AttendanceRow {
    tournament_id: i64,
    tournament_name: String,
    tier_name: String,
    entrant_name: String,
    placement: i32,
    bracket_reset: bool,
    placements: Vec<i32>,
    multiplier: i32,
}

impl Entrant {
    /// Best placement first.
    pub(crate) async fn for_tournament(transaction: &mut Transaction<'_, Postgres>, tournament_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(&format!("{SELECT} WHERE entrants.tournament_id = $1 ORDER BY entrants.placement, entrants.name"))
            .bind(tournament_id)
            .fetch_all(&mut **transaction).await
    }

    pub(crate) async fn from_id(transaction: &mut Transaction<'_, Postgres>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(&format!("{SELECT} WHERE entrants.id = $1"))
            .bind(id)
            .fetch_optional(&mut **transaction).await
    }

    pub(crate) async fn with_points(transaction: &mut Transaction<'_, Postgres>, tournament: &Tournament, multiplier: i32) -> Result<Vec<(Self, i32)>, PointsError> {
        let point_table = formula::point_table(tournament.bracket_reset, &tournament.placements, multiplier);
        Self::for_tournament(transaction, tournament.id).await?
            .into_iter()
            .map(|entrant| -> Result<_, PointsError> {
                let points = point_table.get(&entrant.placement).copied().ok_or_else(|| formula::PlacementNotFound {
                    placement: entrant.placement,
                    placements: tournament.placements.clone(),
                })?;
                Ok((entrant, points))
            })
            .collect()
    }

    pub(crate) async fn create_all(transaction: &mut Transaction<'_, Postgres>, tournament_id: i64, entrants: &[import::Entrant]) -> Result<(), sqlx::Error> {
        let (names, placements) = entrants.iter()
            .map(|import::Entrant { name, placement }| (name.clone(), *placement))
            .unzip::<_, _, Vec<_>, Vec<_>>();
        sqlx::query("INSERT INTO entrants (tournament_id, name, placement) SELECT $1, name, placement FROM UNNEST($2::TEXT[], $3::INTEGER[]) AS imported (name, placement)")
            .bind(tournament_id)
            .bind(names)
            .bind(placements)
            .execute(&mut **transaction).await?;
        Ok(())
    }

    /// `None` unlinks the entrant from its player.
    pub(crate) async fn set_player(&mut self, transaction: &mut Transaction<'_, Postgres>, player: Option<&Player>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE entrants SET player_id = $1 WHERE id = $2")
            .bind(player.map(|player| player.id))
            .bind(self.id)
            .execute(&mut **transaction).await?;
        self.player_id = player.map(|player| player.id);
        self.player_name = player.map(|player| player.name.clone());
        Ok(())
    }

    pub(crate) async fn delete_for_tournament(transaction: &mut Transaction<'_, Postgres>, tournament_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM entrants WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut **transaction).await?;
        Ok(())
    }

    /// All tournament results of the given player, most recent tournament first.
    pub(crate) async fn attendance(transaction: &mut Transaction<'_, Postgres>, player_id: i64) -> Result<Vec<Attendance>, PointsError> {
        let rows = sqlx::query_as::<_, AttendanceRow>("
            SELECT
                tournaments.id AS tournament_id,
                tournaments.name AS tournament_name,
                tiers.name AS tier_name,
                entrants.name AS entrant_name,
                entrants.placement,
                tournaments.bracket_reset,
                tournaments.placements,
                tiers.multiplier
            FROM entrants
            JOIN tournaments ON tournaments.id = entrants.tournament_id
            JOIN tiers ON tiers.id = tournaments.tier_id
            WHERE entrants.player_id = $1
            ORDER BY tournaments.id DESC
        ")
            .bind(player_id)
            .fetch_all(&mut **transaction).await?;
        rows.into_iter()
            .map(|row| -> Result<_, PointsError> {
                Ok(Attendance {
                    points: formula::points(row.bracket_reset, &row.placements, row.multiplier, row.placement)?,
                    tournament: tournament::Preview {
                        id: row.tournament_id,
                        name: row.tournament_name,
                        tier_name: row.tier_name,
                    },
                    entrant_name: row.entrant_name,
                    placement: row.placement,
                })
            })
            .collect()
    }

    pub(crate) fn player(&self) -> Option<Player> {
        Some(Player {
            id: self.player_id?,
            name: self.player_name.clone()?,
        })
    }
}

#[derive(FromForm, CsrfForm)]
pub(crate) struct PlayerForm {
    #[field(default = String::new())]
    csrf: String,
    /// Empty to unlink.
    player: Option<i64>,
}

async fn edit_player_page(mut transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, entrant: Entrant, ctx: Context<'_>) -> Result<RawHtml<String>, StatusOrError<PageError>> {
    let tournament = Tournament::from_id(&mut transaction, entrant.tournament_id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    let players = Player::all(&mut transaction).await?;
    let current = entrant.player_id.map(|player_id| player_id.to_string()).unwrap_or_default();
    let selected = ctx.field_value("player").unwrap_or(&current);
    let mut errors = ctx.errors().collect_vec();
    Ok(page(transaction, PageStyle { kind: PageKind::Tournaments }, &format!("Link {} — Tourney Tracker", entrant.name), html! {
        h1 {
            : "Link ";
            bdi : &entrant.name;
            : " to a player";
        }
        p {
            : "Placed ";
            : entrant.placement.to_string();
            : " in ";
            a(href = uri!(tournament::get(tournament.id))) : &tournament.name;
            : ".";
        }
        : full_form(uri!(set_player(entrant.id)), csrf, html! {
            : form_field("player", &mut errors, html! {
                label(for = "player") : "Player:";
                select(id = "player", name = "player") {
                    option(value = "", selected? = selected.is_empty()) : "(none)";
                    @for player in &players {
                        @let value = player.id.to_string();
                        option(value = &value, selected? = selected == value) : &player.name;
                    }
                }
                label(class = "help") {
                    : "(Players can be created on the ";
                    a(href = uri!(crate::player::list)) : "players page";
                    : ".)";
                }
            });
        }, errors, "Save");
    }).await?)
}

#[rocket::get("/entrants/<id>/player/edit")]
pub(crate) async fn edit_player(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64) -> Result<RawHtml<String>, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let entrant = Entrant::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    edit_player_page(transaction, csrf.as_ref(), entrant, Context::default()).await
}

#[rocket::post("/entrants/<id>/player", data = "<form>")]
pub(crate) async fn set_player(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64, form: Form<Contextual<'_, PlayerForm>>) -> Result<RedirectOrContent, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let mut entrant = Entrant::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    let mut form = form.into_inner();
    form.verify(&csrf);
    if let Some(ref value) = form.value {
        let player = if let Some(player_id) = value.player {
            let player = Player::from_id(&mut transaction, player_id).await?;
            if player.is_none() {
                form.context.push_error(form::Error::validation("There is no such player.").with_name("player"));
            }
            player
        } else {
            None
        };
        if form.context.errors().next().is_none() {
            entrant.set_player(&mut transaction, player.as_ref()).await?;
            transaction.commit().await?;
            return Ok(RedirectOrContent::Redirect(Redirect::to(uri!(tournament::get(entrant.tournament_id)))))
        }
    }
    Ok(RedirectOrContent::Content(edit_player_page(transaction, csrf.as_ref(), entrant, form.context).await?))
}
