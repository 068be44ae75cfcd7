//! Server-side HTML pages.
//!
//! Pages are assembled from small `format!` fragments. Every value that can
//! come from a user goes through [`escape`] before it is written out.

use std::fmt::Write;

use actix_web::http::StatusCode;
use chrono::NaiveDate;

use crate::forms::{self, FormData, FormErrors, DATE_FORMAT, NON_FIELD};
use crate::models::Section;
use crate::tracking::{Catalog, DaySummary};

/// Blank product rows offered below the existing ones.
pub(crate) const EXTRA_PRODUCT_FORMS: usize = 3;

/// Escapes the five HTML-special characters for text and attribute values.
pub(crate) fn escape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(ch),
        }
    }
    output
}

pub(crate) fn kcal(value: f64) -> String {
    format!("{value:.1}")
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} | Tracker</title>
</head>
<body>
<nav><a href="/">Home</a> | <a href="/food/">Food</a> | <a href="/track/">Track</a></nav>
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

fn error_list(messages: &[String]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let items: String = messages
        .iter()
        .map(|message| format!("<li>{}</li>", escape(message)))
        .collect();
    format!(r#"<ul class="errorlist">{items}</ul>"#)
}

fn input(data: &FormData, errors: &FormErrors, name: &str, label: &str, kind: &str) -> String {
    format!(
        r#"<p><label for="id_{name}">{label}</label> <input type="{kind}" name="{name}" id="id_{name}" value="{value}" step="any">{errors}</p>"#,
        name = escape(name),
        label = escape(label),
        value = escape(data.get(name).unwrap_or_default()),
        errors = error_list(errors.field(name)),
    )
}

fn select<'a>(
    name: &str,
    options: impl IntoIterator<Item = (i32, &'a str)>,
    selected: Option<&str>,
) -> String {
    let mut html = format!(r#"<select name="{name}"><option value="">---------</option>"#, name = escape(name));
    for (id, label) in options {
        let chosen = if selected == Some(id.to_string().as_str()) {
            " selected"
        } else {
            ""
        };
        let _ = write!(html, r#"<option value="{id}"{chosen}>{}</option>"#, escape(label));
    }
    html.push_str("</select>");
    html
}

pub(crate) fn home() -> String {
    layout(
        "Calorie tracker",
        r#"<p>Keep a list of <a href="/food/">foods and recipes</a> and <a href="/track/">track</a> what you eat each day.</p>"#,
    )
}

pub(crate) fn food_list(catalog: &Catalog) -> String {
    let mut rows = String::new();
    for recipe in catalog.recipes() {
        let per_100g = catalog
            .calories_per_100g(recipe.id)
            .map(kcal)
            .unwrap_or_else(|_| "n/a".to_string());
        let kind = if catalog.alias_food(recipe.id).is_some() {
            "food"
        } else {
            "recipe"
        };
        let _ = write!(
            rows,
            r#"<tr><td>{name}</td><td>{kind}</td><td>{description}</td><td>{per_100g}</td><td><a href="/food/{id}/edit/">edit</a> <form method="post" action="/food/{id}/delete/" style="display:inline"><button type="submit">delete</button></form></td></tr>
"#,
            name = escape(&recipe.name),
            description = escape(&recipe.description),
            id = recipe.id,
        );
    }
    let body = format!(
        r#"<p><a href="/food/add/">Add food</a> | <a href="/recipe/add/">Add recipe</a></p>
<table>
<thead><tr><th>Name</th><th>Kind</th><th>Description</th><th>kcal / 100 g</th><th></th></tr></thead>
<tbody>
{rows}</tbody>
</table>"#
    );
    layout("Food", &body)
}

pub(crate) fn food_form(title: &str, action: &str, data: &FormData, errors: &FormErrors) -> String {
    let body = format!(
        r#"<form method="post" action="{action}">
{non_field}{name}
{calories}
<button type="submit">Save</button>
</form>"#,
        action = escape(action),
        non_field = error_list(errors.field(NON_FIELD)),
        name = input(data, errors, "name", "Name", "text"),
        calories = input(data, errors, "calories", "Food calories in 100 gram", "number"),
    );
    layout(title, &body)
}

fn product_row(
    data: &FormData,
    errors: &FormErrors,
    catalog: &Catalog,
    index: usize,
    owner: Option<i32>,
) -> String {
    let field = |name: &str| forms::product_field(index, name);
    let id = data.get(&field("id"));
    let foods = catalog.foods().into_iter().map(|food| (food.id, food.name.as_str()));
    let recipes = catalog
        .recipes()
        .into_iter()
        .filter(|recipe| Some(recipe.id) != owner)
        .map(|recipe| (recipe.id, recipe.name.as_str()));

    let mut row = String::from("<tr>");
    let _ = write!(
        row,
        r#"<td>{hidden}{food}{food_errors}</td><td>{recipe}{recipe_errors}</td><td><input type="number" step="any" name="{quantity_name}" value="{quantity}">{quantity_errors}</td>"#,
        hidden = id
            .map(|id| format!(r#"<input type="hidden" name="{}" value="{}">"#, field("id"), escape(id)))
            .unwrap_or_default(),
        food = select(&field("have_food"), foods, data.get(&field("have_food"))),
        food_errors = error_list(errors.field(&field("have_food"))),
        recipe = select(&field("have_recipe"), recipes, data.get(&field("have_recipe"))),
        recipe_errors = error_list(errors.field(&field("have_recipe"))),
        quantity_name = field("quantity"),
        quantity = escape(data.get(&field("quantity")).unwrap_or_default()),
        quantity_errors = error_list(errors.field(&field("quantity"))),
    );
    if id.is_some() {
        let _ = write!(
            row,
            r#"<td><label><input type="checkbox" name="{}"> delete</label></td>"#,
            field("DELETE")
        );
    } else {
        row.push_str("<td></td>");
    }
    let _ = write!(
        row,
        "<td>{}{}</td></tr>\n",
        error_list(errors.field(&field(NON_FIELD))),
        error_list(errors.field(&field("id"))),
    );
    row
}

/// Recipe form plus its product formset. `extra` blank rows are appended to
/// the rows already present in `data`.
pub(crate) fn recipe_form(
    title: &str,
    action: &str,
    data: &FormData,
    errors: &FormErrors,
    catalog: &Catalog,
    owner: Option<i32>,
    extra: usize,
) -> String {
    let total = forms::submitted_total(data).saturating_add(extra);
    let rows: String = (0..total)
        .map(|index| product_row(data, errors, catalog, index, owner))
        .collect();

    let body = format!(
        r#"<form method="post" action="{action}">
{non_field}{name}
<p><label for="id_description">Description</label> <textarea name="description" id="id_description">{description}</textarea></p>
<input type="hidden" name="{total_name}" value="{total}">
<table>
<thead><tr><th>Food</th><th>Recipe</th><th>Quantity (g)</th><th></th><th></th></tr></thead>
<tbody>
{rows}</tbody>
</table>
<button type="submit">Save</button>
</form>"#,
        action = escape(action),
        non_field = error_list(errors.field(NON_FIELD)),
        name = input(data, errors, "name", "Name", "text"),
        description = escape(data.get("description").unwrap_or_default()),
        total_name = forms::total_forms_field(),
    );
    layout(title, &body)
}

pub(crate) fn track(summary: &DaySummary) -> String {
    let date = summary.date.format(DATE_FORMAT).to_string();
    let mut body = String::new();
    let nav_day = |day: Option<NaiveDate>, label: &str| {
        day.map(|day| format!(r#"<a href="/track/{}/">{label}</a>"#, day.format(DATE_FORMAT)))
            .unwrap_or_default()
    };
    let _ = writeln!(
        body,
        "<p>{} | {}</p>",
        nav_day(summary.date.pred_opt(), "previous day"),
        nav_day(summary.date.succ_opt(), "next day"),
    );

    for section in &summary.sections {
        let _ = writeln!(
            body,
            r#"<section id="section-{index}"><h2>{name}: <span class="total">{total}</span> kcal</h2><ul>"#,
            index = section.index,
            name = escape(section.name),
            total = kcal(section.total),
        );
        for line in &section.records {
            let _ = writeln!(
                body,
                r#"<li>{name}, {weight} g: {total} kcal <form method="post" action="/record/{id}/delete/" style="display:inline"><button type="submit">remove</button></form></li>"#,
                name = escape(&line.recipe_name),
                weight = line.weight,
                total = kcal(line.total),
                id = line.id,
            );
        }
        let _ = writeln!(
            body,
            r#"</ul><a href="/record/add/{index}/?date={date}">add</a></section>"#,
            index = section.index,
        );
    }
    let _ = write!(
        body,
        r#"<p>Total: <strong id="day-total">{}</strong> kcal</p>"#,
        kcal(summary.total)
    );
    layout(&format!("Track {date}"), &body)
}

pub(crate) fn record_form(
    section: Section,
    data: &FormData,
    errors: &FormErrors,
    catalog: &Catalog,
) -> String {
    let recipes = catalog
        .recipes()
        .into_iter()
        .map(|recipe| (recipe.id, recipe.name.as_str()));
    let body = format!(
        r#"<form method="post" action="/record/add/{index}/">
{non_field}<p><label>Eaten food</label> {recipe}{recipe_errors}</p>
{weight}
{date}
<button type="submit">Add</button>
</form>"#,
        index = section.index(),
        non_field = error_list(errors.field(NON_FIELD)),
        recipe = select("recipe", recipes, data.get("recipe")),
        recipe_errors = error_list(errors.field("recipe")),
        weight = input(data, errors, "weight", "Weight of eaten food", "number"),
        date = input(data, errors, "date_added", "Date", "date"),
    );
    layout(&format!("Add to {section}"), &body)
}

pub(crate) fn error_page(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    layout(title, &format!("<p>{}</p>", escape(message)))
}
