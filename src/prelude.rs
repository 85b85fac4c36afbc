pub(crate) use {
    std::{
        borrow::Cow,
        cmp::Reverse,
        collections::HashMap,
        fmt,
        mem,
        time::Duration,
    },
    itertools::Itertools as _,
    rocket::{
        FromForm,
        Responder,
        State,
        form::{
            self,
            Context,
            Contextual,
            Form,
        },
        http::Status,
        response::{
            Redirect,
            content::RawHtml,
        },
        uri,
    },
    rocket_csrf::CsrfToken,
    rocket_util::{
        ContextualExt as _,
        CsrfForm,
        ToHtml,
        html,
    },
    serde::Deserialize,
    sqlx::{
        PgPool,
        Postgres,
        Transaction,
    },
    wheel::traits::IsNetworkError,
    crate::{
        Environment,
        config::Config,
        form::{
            button_form,
            form_field,
            full_form,
        },
        formula,
        http::{
            PageKind,
            PageStyle,
            RedirectOrContent,
            StatusOrError,
            page,
        },
    },
};
