use crate::{
    http::{
        PageError,
        PageResult,
    },
    prelude::*,
    tournament::Tournament,
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct Tier {
    pub(crate) id: i64,
    pub(crate) name: String,
    pub(crate) multiplier: i32,
}

impl Tier {
    pub(crate) async fn all(transaction: &mut Transaction<'_, Postgres>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, multiplier FROM tiers ORDER BY multiplier DESC, id")
            .fetch_all(&mut **transaction).await
    }

    pub(crate) async fn from_id(transaction: &mut Transaction<'_, Postgres>, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, multiplier FROM tiers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **transaction).await
    }

    pub(crate) async fn for_tournament(transaction: &mut Transaction<'_, Postgres>, tournament_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT tiers.id, tiers.name, tiers.multiplier FROM tiers JOIN tournaments ON tournaments.tier_id = tiers.id WHERE tournaments.id = $1")
            .bind(tournament_id)
            .fetch_optional(&mut **transaction).await
    }

    /// The tier for newly imported tournaments: the configured one if it exists, otherwise the one with the lowest ID.
    pub(crate) async fn default_id(transaction: &mut Transaction<'_, Postgres>, configured: Option<i64>) -> Result<Option<i64>, sqlx::Error> {
        if let Some(id) = configured {
            if Self::from_id(&mut *transaction, id).await?.is_some() {
                return Ok(Some(id))
            }
            log::warn!("configured default tier {id} does not exist, falling back to the tier with the lowest ID");
        }
        sqlx::query_scalar("SELECT id FROM tiers ORDER BY id LIMIT 1")
            .fetch_optional(&mut **transaction).await
    }

    async fn name_taken(transaction: &mut Transaction<'_, Postgres>, name: &str, except: Option<i64>) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tiers WHERE name = $1 AND id IS DISTINCT FROM $2)")
            .bind(name)
            .bind(except)
            .fetch_one(&mut **transaction).await
    }

    pub(crate) async fn create(transaction: &mut Transaction<'_, Postgres>, name: &str, multiplier: i32) -> Result<Self, sqlx::Error> {
        sqlx::query_as("INSERT INTO tiers (name, multiplier) VALUES ($1, $2) RETURNING id, name, multiplier")
            .bind(name)
            .bind(multiplier)
            .fetch_one(&mut **transaction).await
    }

    pub(crate) async fn update(&mut self, transaction: &mut Transaction<'_, Postgres>, name: String, multiplier: i32) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tiers SET name = $1, multiplier = $2 WHERE id = $3")
            .bind(&name)
            .bind(multiplier)
            .bind(self.id)
            .execute(&mut **transaction).await?;
        self.name = name;
        self.multiplier = multiplier;
        Ok(())
    }

    /// The schema prevents deleting a tier which still has tournaments, so callers should check [`Tournament::names_by_tier`] first.
    pub(crate) async fn delete(self, transaction: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM tiers WHERE id = $1")
            .bind(self.id)
            .execute(&mut **transaction).await?;
        Ok(())
    }
}

impl ToHtml for Tier {
    fn to_html(&self) -> RawHtml<String> {
        html! {
            a(href = uri!(get(self.id))) : &self.name;
        }
    }
}

#[derive(FromForm, CsrfForm)]
pub(crate) struct TierForm {
    #[field(default = String::new())]
    csrf: String,
    name: String,
    multiplier: i32,
}

impl TierForm {
    /// Adds validation errors to the form context and returns the trimmed name if there were none.
    async fn validate(&self, transaction: &mut Transaction<'_, Postgres>, ctx: &mut Context<'_>, existing: Option<i64>) -> Result<Option<String>, sqlx::Error> {
        let name = self.name.trim();
        if name.is_empty() {
            ctx.push_error(form::Error::validation("The tier name must not be empty.").with_name("name"));
        } else if Tier::name_taken(transaction, name, existing).await? {
            ctx.push_error(form::Error::validation("A tier with this name already exists.").with_name("name"));
        }
        if self.multiplier < 1 {
            ctx.push_error(form::Error::validation("The multiplier must be at least 1.").with_name("multiplier"));
        }
        Ok(ctx.errors().next().is_none().then(|| name.to_owned()))
    }
}

fn tier_form_fields(ctx: &Context<'_>, errors: &mut Vec<&form::Error<'_>>, tier: Option<&Tier>) -> RawHtml<String> {
    let multiplier = tier.map(|tier| tier.multiplier.to_string());
    html! {
        : form_field("name", errors, html! {
            label(for = "name") : "Name:";
            input(type = "text", id = "name", name = "name", value? = ctx.field_value("name").or(tier.map(|tier| &*tier.name)));
        });
        : form_field("multiplier", errors, html! {
            label(for = "multiplier") : "Multiplier:";
            input(type = "number", id = "multiplier", name = "multiplier", min = "1", value? = ctx.field_value("multiplier").or(multiplier.as_deref()));
        });
    }
}

async fn list_page(mut transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, ctx: Context<'_>) -> PageResult {
    let tiers = Tier::all(&mut transaction).await?;
    let mut errors = ctx.errors().collect_vec();
    page(transaction, PageStyle { kind: PageKind::Tiers }, "Tiers — Tourney Tracker", html! {
        h1 : "Tiers";
        @if tiers.is_empty() {
            p : "No tiers so far. Tournaments can only be imported once at least one tier exists.";
        } else {
            table {
                thead {
                    tr {
                        th : "Tier";
                        th : "Multiplier";
                    }
                }
                tbody {
                    @for tier in &tiers {
                        tr {
                            td : tier;
                            td : tier.multiplier.to_string();
                        }
                    }
                }
            }
        }
        h2 : "New tier";
        : full_form(uri!(create), csrf, tier_form_fields(&ctx, &mut errors, None), errors, "Create");
    }).await
}

#[rocket::get("/tiers")]
pub(crate) async fn list(pool: &State<PgPool>, csrf: Option<CsrfToken>) -> PageResult {
    list_page(pool.begin().await?, csrf.as_ref(), Context::default()).await
}

#[rocket::post("/tiers/new", data = "<form>")]
pub(crate) async fn create(pool: &State<PgPool>, csrf: Option<CsrfToken>, form: Form<Contextual<'_, TierForm>>) -> Result<RedirectOrContent, PageError> {
    let mut transaction = pool.begin().await?;
    let mut form = form.into_inner();
    form.verify(&csrf);
    Ok(if let Some(ref value) = form.value {
        if let Some(name) = value.validate(&mut transaction, &mut form.context, None).await? {
            let tier = Tier::create(&mut transaction, &name, value.multiplier).await?;
            transaction.commit().await?;
            log::info!("created tier {:?} with multiplier {}", tier.name, tier.multiplier);
            RedirectOrContent::Redirect(Redirect::to(uri!(get(tier.id))))
        } else {
            RedirectOrContent::Content(list_page(transaction, csrf.as_ref(), form.context).await?)
        }
    } else {
        RedirectOrContent::Content(list_page(transaction, csrf.as_ref(), form.context).await?)
    })
}

async fn tier_page(mut transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, tier: Tier, ctx: Context<'_>) -> PageResult {
    let tournaments = Tournament::names_by_tier(&mut transaction, tier.id).await?;
    let (delete_errors, delete_button) = button_form(uri!(delete(tier.id)), csrf, ctx.errors().collect(), "Delete");
    page(transaction, PageStyle { kind: PageKind::Tiers }, &format!("{} — Tourney Tracker", tier.name), html! {
        h1 : &tier.name;
        p {
            : "Points earned in tournaments of this tier are multiplied by ";
            : tier.multiplier.to_string();
            : ".";
        }
        h2 : "Tournaments";
        @if tournaments.is_empty() {
            p : "No tournaments in this tier.";
        } else {
            ul {
                @for tournament in tournaments {
                    li : tournament;
                }
            }
        }
        : delete_errors;
        div(class = "button-row") {
            a(class = "button", href = uri!(edit(tier.id))) : "Edit";
            : delete_button;
        }
    }).await
}

#[rocket::get("/tiers/<id>")]
pub(crate) async fn get(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64) -> Result<RawHtml<String>, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let tier = Tier::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    Ok(tier_page(transaction, csrf.as_ref(), tier, Context::default()).await?)
}

async fn edit_page(transaction: Transaction<'_, Postgres>, csrf: Option<&CsrfToken>, tier: Tier, ctx: Context<'_>) -> PageResult {
    let mut errors = ctx.errors().collect_vec();
    page(transaction, PageStyle { kind: PageKind::Tiers }, &format!("Edit {} — Tourney Tracker", tier.name), html! {
        h1 {
            : "Edit ";
            : &tier;
        }
        : full_form(uri!(update(tier.id)), csrf, tier_form_fields(&ctx, &mut errors, Some(&tier)), errors, "Save");
    }).await
}

#[rocket::get("/tiers/<id>/edit")]
pub(crate) async fn edit(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64) -> Result<RawHtml<String>, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let tier = Tier::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    Ok(edit_page(transaction, csrf.as_ref(), tier, Context::default()).await?)
}

#[rocket::post("/tiers/<id>", data = "<form>")]
pub(crate) async fn update(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64, form: Form<Contextual<'_, TierForm>>) -> Result<RedirectOrContent, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let mut tier = Tier::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    let mut form = form.into_inner();
    form.verify(&csrf);
    Ok(if let Some(ref value) = form.value {
        if let Some(name) = value.validate(&mut transaction, &mut form.context, Some(tier.id)).await? {
            tier.update(&mut transaction, name, value.multiplier).await?;
            transaction.commit().await?;
            RedirectOrContent::Redirect(Redirect::to(uri!(get(tier.id))))
        } else {
            RedirectOrContent::Content(edit_page(transaction, csrf.as_ref(), tier, form.context).await?)
        }
    } else {
        RedirectOrContent::Content(edit_page(transaction, csrf.as_ref(), tier, form.context).await?)
    })
}

#[derive(FromForm, CsrfForm)]
pub(crate) struct DeleteForm {
    #[field(default = String::new())]
    csrf: String,
}

#[rocket::post("/tiers/<id>/delete", data = "<form>")]
pub(crate) async fn delete(pool: &State<PgPool>, csrf: Option<CsrfToken>, id: i64, form: Form<Contextual<'_, DeleteForm>>) -> Result<RedirectOrContent, StatusOrError<PageError>> {
    let mut transaction = pool.begin().await?;
    let tier = Tier::from_id(&mut transaction, id).await?.ok_or(StatusOrError::Status(Status::NotFound))?;
    let mut form = form.into_inner();
    form.verify(&csrf);
    if form.value.is_some() {
        let tournaments = Tournament::names_by_tier(&mut transaction, tier.id).await?;
        if tournaments.is_empty() {
            log::info!("deleting tier {:?}", tier.name);
            tier.delete(&mut transaction).await?;
            transaction.commit().await?;
            return Ok(RedirectOrContent::Redirect(Redirect::to(uri!(list))))
        }
        form.context.push_error(form::Error::validation(format!(
            "This tier still has {} tournament{}. Move {} to another tier first.",
            tournaments.len(),
            if tournaments.len() == 1 { "" } else { "s" },
            if tournaments.len() == 1 { "it" } else { "them" },
        )));
    }
    Ok(RedirectOrContent::Content(tier_page(transaction, csrf.as_ref(), tier, form.context).await?))
}
