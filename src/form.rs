use {
    rocket::http::uri::Origin,
    crate::prelude::*,
};

fn render_form_error(error: &form::Error<'_>) -> RawHtml<String> {
    html! {
        p(class = "error") : error.to_string();
    }
}

/// Renders a fieldset with the errors for the given field, removing them from `errors`.
pub(crate) fn form_field(name: &str, errors: &mut Vec<&form::Error<'_>>, content: impl ToHtml) -> RawHtml<String> {
    let (field_errors, other_errors) = mem::take(errors).into_iter().partition::<Vec<_>, _>(|error| error.is_for(name));
    *errors = other_errors;
    html! {
        fieldset(class? = (!field_errors.is_empty()).then_some("error")) {
            @for error in field_errors {
                : render_form_error(error);
            }
            : content;
        }
    }
}

/// `errors` should contain the errors not already rendered by [`form_field`].
pub(crate) fn full_form(uri: Origin<'_>, csrf: Option<&CsrfToken>, content: impl ToHtml, errors: Vec<&form::Error<'_>>, submit_text: &str) -> RawHtml<String> {
    html! {
        form(action = uri.to_string(), method = "post") {
            : csrf;
            @for error in errors {
                : render_form_error(error);
            }
            : content;
            fieldset {
                input(type = "submit", value = submit_text);
            }
        }
    }
}

/// A form consisting of only a submit button. Returns the rendered errors separately so they can be placed outside a button row.
pub(crate) fn button_form(uri: Origin<'_>, csrf: Option<&CsrfToken>, errors: Vec<&form::Error<'_>>, submit_text: &str) -> (RawHtml<String>, RawHtml<String>) {
    let errors = html! {
        @for error in errors {
            : render_form_error(error);
        }
    };
    let button = html! {
        form(action = uri.to_string(), method = "post") {
            : csrf;
            input(type = "submit", value = submit_text);
        }
    };
    (errors, button)
}
