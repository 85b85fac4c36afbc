use {
    base64::engine::{
        Engine as _,
        general_purpose::STANDARD as BASE64,
    },
    rocket::{
        Request,
        Rocket,
        config::SecretKey,
        fs::FileServer,
    },
    rocket_util::Doctype,
    crate::{
        entrant,
        import::Importer,
        player,
        tier,
        tournament,
        prelude::*,
    },
};

include!(concat!(env!("OUT_DIR"), "/static_files.rs"));

#[derive(Responder)]
pub(crate) enum RedirectOrContent {
    Redirect(Redirect),
    Content(RawHtml<String>),
}

#[derive(Responder)]
pub(crate) enum StatusOrError<E> {
    Status(Status),
    Err(E),
}

/// Which navigation entry is highlighted.
#[derive(PartialEq, Eq)]
pub(crate) enum PageKind {
    Rankings,
    Tournaments,
    Players,
    Tiers,
    About,
    Other,
}

pub(crate) struct PageStyle {
    pub(crate) kind: PageKind,
}

impl Default for PageStyle {
    fn default() -> Self {
        Self {
            kind: PageKind::Other,
        }
    }
}

#[derive(Debug, thiserror::Error, rocket_util::Error)]
pub(crate) enum PageError {
    #[error(transparent)] Points(#[from] entrant::PointsError),
    #[error(transparent)] Sql(#[from] sqlx::Error),
}

impl<E: Into<PageError>> From<E> for StatusOrError<PageError> {
    fn from(e: E) -> Self {
        Self::Err(e.into())
    }
}

impl IsNetworkError for PageError {
    fn is_network_error(&self) -> bool {
        match self {
            Self::Points(_) => false,
            Self::Sql(_) => false,
        }
    }
}

pub(crate) type PageResult = Result<RawHtml<String>, PageError>;

fn nav_link(style: &PageStyle, kind: PageKind, uri: rocket::http::uri::Origin<'static>, text: &str) -> RawHtml<String> {
    html! {
        @if style.kind == kind {
            span(class = "nav selected") : text;
        } else {
            a(class = "nav", href = uri.to_string()) : text;
        }
    }
}

pub(crate) async fn page(transaction: Transaction<'_, Postgres>, style: PageStyle, title: &str, content: impl ToHtml) -> PageResult {
    transaction.commit().await?;
    Ok(html! {
        : Doctype;
        html {
            head {
                meta(charset = "utf-8");
                title : title;
                meta(name = "viewport", content = "width=device-width, initial-scale=1, shrink-to-fit=no");
                link(rel = "stylesheet", href = static_url!("common.css"));
            }
            body {
                nav {
                    h1 : "Tourney Tracker";
                    div(class = "nav-links") {
                        : nav_link(&style, PageKind::Rankings, uri!(player::rankings), "Rankings");
                        : nav_link(&style, PageKind::Tournaments, uri!(tournament::list), "Tournaments");
                        : nav_link(&style, PageKind::Players, uri!(player::list), "Players");
                        : nav_link(&style, PageKind::Tiers, uri!(tier::list), "Tiers");
                        : nav_link(&style, PageKind::About, uri!(about), "About");
                    }
                }
                main {
                    : content;
                }
                footer {
                    p {
                        : "tourney-tracker ";
                        : env!("CARGO_PKG_VERSION");
                    }
                }
            }
        }
    })
}

#[rocket::get("/about")]
async fn about(pool: &State<PgPool>) -> PageResult {
    // an 8-entrant double elimination bracket, for illustration
    let example_placements = [7, 5, 4, 3, 2, 1];
    let example_table = formula::point_table(true, &example_placements, 1);
    page(pool.begin().await?, PageStyle { kind: PageKind::About }, "About — Tourney Tracker", html! {
        h1 : "How points are calculated";
        p {
            : "Every entrant of an imported tournament earns points based on how many distinct placements they beat. ";
            : "The placements of a tournament are sorted from worst to best, and the index of an entrant's placement in that list is their placement value (PV). ";
            : "Ties share a placement, so the worst placement always has a PV of 0.";
        }
        pre {
            code : "points = (UP × PV + ATT + FIRST + BR) × tier multiplier";
        }
        table {
            thead {
                tr {
                    th : "Constant";
                    th : "Points";
                    th : "Awarded for";
                }
            }
            tbody {
                tr {
                    td : "UP";
                    td : formula::UP.to_string();
                    td : "each distinct placement below yours";
                }
                tr {
                    td : "ATT";
                    td : formula::ATT.to_string();
                    td : "attending a tournament";
                }
                tr {
                    td : "FIRST";
                    td : formula::FIRST.to_string();
                    td : "winning a tournament";
                }
                tr {
                    td : "BR";
                    td : formula::BR.to_string();
                    td : "finishing second after forcing a bracket reset in the grand final";
                }
            }
        }
        h2 : "Example";
        p : "An 8-entrant double elimination tournament in a tier with multiplier 1, where the runner-up made a bracket reset:";
        table {
            thead {
                tr {
                    th : "Placement";
                    th : "PV";
                    th : "Points";
                }
            }
            tbody {
                @for (pv, placement) in example_placements.iter().enumerate() {
                    tr {
                        td : placement.to_string();
                        td : pv.to_string();
                        td : example_table.get(placement).copied().unwrap_or_default().to_string();
                    }
                }
            }
        }
        p {
            : "Tiers and their multipliers are listed on the ";
            a(href = uri!(tier::list)) : "tiers page";
            : ".";
        }
    }).await
}

async fn error_page(request: &Request<'_>, title: &str, content: RawHtml<String>) -> PageResult {
    let Some(pool) = request.rocket().state::<PgPool>() else {
        return Err(PageError::Sql(sqlx::Error::PoolClosed))
    };
    page(pool.begin().await?, PageStyle::default(), title, content).await
}

#[rocket::catch(404)]
async fn not_found(request: &Request<'_>) -> PageResult {
    error_page(request, "Not Found — Tourney Tracker", html! {
        h1 : "Error 404: Not Found";
        p : "There is no tournament, player, or tier at this address. It may have been deleted.";
    }).await
}

#[rocket::catch(500)]
async fn internal_server_error(request: &Request<'_>) -> PageResult {
    log::error!("responding with 500 Internal Server Error to request {request}");
    error_page(request, "Internal Server Error — Tourney Tracker", html! {
        h1 : "Error 500: Internal Server Error";
        p : "Sorry, something went wrong. The error has been logged.";
    }).await
}

#[rocket::catch(502)]
async fn bad_gateway(request: &Request<'_>) -> PageResult {
    log::warn!("responding with 502 Bad Gateway to request {request}");
    error_page(request, "Bad Gateway — Tourney Tracker", html! {
        h1 : "Error 502: Bad Gateway";
        p : "Sorry, there was a network error. Please try again.";
    }).await
}

#[rocket::catch(default)]
async fn fallback_catcher(status: Status, request: &Request<'_>) -> PageResult {
    log::error!("responding with unexpected HTTP status code {} {} to request {request}", status.code, status.reason_lossy());
    error_page(request, &format!("{} — Tourney Tracker", status.reason_lossy()), html! {
        h1 {
            : "Error ";
            : status.code.to_string();
            : ": ";
            : status.reason_lossy();
        }
        p : "Sorry, something went wrong.";
    }).await
}

pub(crate) async fn rocket(pool: PgPool, importer: Importer, config: Config, port: u16) -> Result<Rocket<rocket::Ignite>, crate::Error> {
    Ok(rocket::custom(rocket::Config::figment().merge(rocket::Config {
        secret_key: SecretKey::from(&BASE64.decode(&config.secret_key)?),
        log_level: Some(rocket::config::Level::ERROR),
        ..rocket::Config::default()
    }).merge(("port", port)))
    .mount("/", rocket::routes![
        about,
        entrant::edit_player,
        entrant::set_player,
        player::rankings,
        player::list,
        player::create,
        player::get,
        player::edit,
        player::update_name,
        player::delete,
        tier::list,
        tier::create,
        tier::get,
        tier::edit,
        tier::update,
        tier::delete,
        tournament::list,
        tournament::import,
        tournament::get,
        tournament::edit_tier,
        tournament::set_tier,
        tournament::delete,
    ])
    .mount("/static", FileServer::without_index("assets/static"))
    .register("/", rocket::catchers![
        not_found,
        internal_server_error,
        bad_gateway,
        fallback_catcher,
    ])
    .attach(rocket_csrf::Fairing::default())
    .manage(config)
    .manage(pool)
    .manage(importer)
    .ignite().await?)
}
