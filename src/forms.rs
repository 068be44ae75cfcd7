//! Input validation for submitted HTML forms.
//!
//! Submissions are kept as the ordered `(name, value)` pairs the browser
//! sent, so an invalid form can be rendered again with what the user typed.
//! Parsing turns the pairs into typed inputs or a [`FormErrors`] map keyed
//! by field name. Checks that need the store (name uniqueness, referenced
//! ids) happen inside the write transaction and report in the same shape.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{Food, ProductSource, Recipe};

pub(crate) const NON_FIELD: &str = "__all__";
pub(crate) const PRODUCT_PREFIX: &str = "products";
pub(crate) const NAME_MAX_LENGTH: usize = 100;
const MAX_PRODUCT_FORMS: usize = 1000;
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FormData(Vec<(String, String)>);

impl FormData {
    pub(crate) fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// Last value submitted under `key`, trimmed; blank counts as missing.
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.0.retain(|(name, _)| *name != key);
        self.0.push((key, value.into()));
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Field name -> messages. [`NON_FIELD`] collects errors not tied to a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub(crate) fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub(crate) fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub(crate) fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FoodInput {
    pub name: String,
    pub calories: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecipeInput {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProductInput {
    /// Row position in the formset, used to key errors back to the row.
    pub index: usize,
    pub id: Option<i32>,
    pub source: ProductSource,
    pub quantity: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ProductFormSet {
    pub products: Vec<ProductInput>,
    pub deleted: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordInput {
    pub recipe_id: i32,
    pub weight: f64,
    pub date_added: NaiveDate,
}

pub(crate) fn product_field(index: usize, field: &str) -> String {
    format!("{PRODUCT_PREFIX}-{index}-{field}")
}

pub(crate) fn total_forms_field() -> String {
    format!("{PRODUCT_PREFIX}-TOTAL_FORMS")
}

fn required_name(data: &FormData, errors: &mut FormErrors) -> Option<String> {
    match data.get("name") {
        None => {
            errors.add("name", REQUIRED);
            None
        }
        Some(name) if name.chars().count() > NAME_MAX_LENGTH => {
            errors.add(
                "name",
                format!("Ensure this value has at most {NAME_MAX_LENGTH} characters."),
            );
            None
        }
        Some(name) => Some(name.to_string()),
    }
}

fn number(data: &FormData, field: &str, errors: &mut FormErrors) -> Option<f64> {
    let Some(raw) = data.get(field) else {
        errors.add(field, REQUIRED);
        return None;
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            errors.add(field, "Enter a number.");
            None
        }
    }
}

fn optional_id(data: &FormData, field: &str, errors: &mut FormErrors) -> Option<i32> {
    let raw = data.get(field)?;
    match raw.parse::<i32>() {
        Ok(id) if id > 0 => Some(id),
        _ => {
            errors.add(field, "Select a valid choice.");
            None
        }
    }
}

pub(crate) fn parse_food(data: &FormData) -> Result<FoodInput, FormErrors> {
    let mut errors = FormErrors::default();
    let name = required_name(data, &mut errors);
    let calories = number(data, "calories", &mut errors);
    if calories.is_some_and(|value| value < 0.0) {
        errors.add("calories", "Calories cannot be negative.");
    }
    errors.finish(|| FoodInput {
        name: name.unwrap_or_default(),
        calories: calories.unwrap_or_default(),
    })
}

pub(crate) fn parse_recipe(data: &FormData) -> Result<RecipeInput, FormErrors> {
    let mut errors = FormErrors::default();
    let name = required_name(data, &mut errors);
    let description = data.get("description").unwrap_or_default().to_string();
    errors.finish(|| RecipeInput {
        name: name.unwrap_or_default(),
        description,
    })
}

fn parse_product_row(
    data: &FormData,
    index: usize,
    formset: &mut ProductFormSet,
    errors: &mut FormErrors,
) {
    let id_field = product_field(index, "id");
    let food_field = product_field(index, "have_food");
    let recipe_field = product_field(index, "have_recipe");
    let quantity_field = product_field(index, "quantity");

    let blank = [&id_field, &food_field, &recipe_field, &quantity_field]
        .iter()
        .all(|field| !data.has(field));
    if blank {
        return;
    }

    let id = optional_id(data, &id_field, errors);
    if data.has(&product_field(index, "DELETE")) {
        if let Some(id) = id {
            formset.deleted.push(id);
        }
        return;
    }

    let have_food = optional_id(data, &food_field, errors);
    let have_recipe = optional_id(data, &recipe_field, errors);
    let source = match (data.has(&food_field), data.has(&recipe_field)) {
        (true, true) => {
            errors.add(
                product_field(index, NON_FIELD),
                "Choose either a food or a recipe, not both.",
            );
            None
        }
        (false, false) => {
            errors.add(
                product_field(index, NON_FIELD),
                "Choose a food or a recipe.",
            );
            None
        }
        _ => have_food
            .map(ProductSource::Food)
            .or(have_recipe.map(ProductSource::Recipe)),
    };

    let quantity = number(data, &quantity_field, errors);
    if quantity.is_some_and(|value| value <= 0.0) {
        errors.add(quantity_field, "Quantity must be greater than zero.");
        return;
    }

    if let (Some(source), Some(quantity)) = (source, quantity) {
        formset.products.push(ProductInput {
            index,
            id,
            source,
            quantity,
        });
    }
}

/// Number of product rows the submission claims, capped at the formset
/// maximum. Missing or malformed counts read as zero.
pub(crate) fn submitted_total(data: &FormData) -> usize {
    data.get(&total_forms_field())
        .and_then(|total| total.parse::<usize>().ok())
        .unwrap_or_default()
        .min(MAX_PRODUCT_FORMS)
}

/// Parses the `products-*` formset. Blank extra rows are ignored; rows
/// flagged `DELETE` that carry an id become deletions.
pub(crate) fn parse_products(data: &FormData) -> Result<ProductFormSet, FormErrors> {
    let mut errors = FormErrors::default();
    let total = match data.get(&total_forms_field()).map(str::parse::<usize>) {
        Some(Ok(total)) if total <= MAX_PRODUCT_FORMS => total,
        Some(Ok(_)) => {
            return Err(FormErrors::single(
                NON_FIELD,
                format!("Please submit at most {MAX_PRODUCT_FORMS} products."),
            ));
        }
        _ => {
            return Err(FormErrors::single(
                NON_FIELD,
                "Product form data is missing or has been tampered with.",
            ));
        }
    };

    let mut formset = ProductFormSet::default();
    for index in 0..total {
        parse_product_row(data, index, &mut formset, &mut errors);
    }
    if errors.is_empty() && formset.products.is_empty() {
        errors.add(NON_FIELD, "A recipe needs at least one product.");
    }
    errors.finish(|| formset)
}

/// Validates the recipe form and every product row, reporting all errors
/// together.
pub(crate) fn parse_recipe_submission(
    data: &FormData,
) -> Result<(RecipeInput, ProductFormSet), FormErrors> {
    match (parse_recipe(data), parse_products(data)) {
        (Ok(recipe), Ok(products)) => Ok((recipe, products)),
        (recipe, products) => {
            let mut errors = FormErrors::default();
            if let Err(recipe_errors) = recipe {
                errors.merge(recipe_errors);
            }
            if let Err(product_errors) = products {
                errors.merge(product_errors);
            }
            Err(errors)
        }
    }
}

pub(crate) fn parse_record(data: &FormData) -> Result<RecordInput, FormErrors> {
    let mut errors = FormErrors::default();
    let recipe_id = optional_id(data, "recipe", &mut errors);
    if !data.has("recipe") {
        errors.add("recipe", REQUIRED);
    }
    let weight = number(data, "weight", &mut errors);
    if weight.is_some_and(|value| value <= 0.0) {
        errors.add("weight", "Weight must be greater than zero.");
    }
    let date_added = match data.get("date_added") {
        None => {
            errors.add("date_added", REQUIRED);
            None
        }
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| errors.add("date_added", "Enter a valid date."))
            .ok(),
    };
    errors.finish(|| RecordInput {
        recipe_id: recipe_id.unwrap_or_default(),
        weight: weight.unwrap_or_default(),
        date_added: date_added.unwrap_or_default(),
    })
}

pub(crate) fn food_initial(food: &Food) -> FormData {
    let mut data = FormData::default();
    data.set("name", food.name.clone());
    data.set("calories", food.calories.to_string());
    data
}

pub(crate) fn recipe_initial(recipe: &Recipe, products: &[crate::models::Product]) -> FormData {
    let mut data = FormData::default();
    data.set("name", recipe.name.clone());
    data.set("description", recipe.description.clone());
    data.set(total_forms_field(), products.len().to_string());
    for (index, product) in products.iter().enumerate() {
        data.set(product_field(index, "id"), product.id.to_string());
        if let Some(food_id) = product.have_food {
            data.set(product_field(index, "have_food"), food_id.to_string());
        }
        if let Some(recipe_id) = product.have_recipe {
            data.set(product_field(index, "have_recipe"), recipe_id.to_string());
        }
        data.set(product_field(index, "quantity"), product.quantity.to_string());
    }
    data
}
