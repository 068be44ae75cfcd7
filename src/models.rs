use std::fmt;

use chrono::NaiveDate;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{food, product, recipe, record};

/// Grams a food-alias product stands for, so the alias recipe's calories per
/// 100 g equal the food's own.
pub(crate) const ALIAS_QUANTITY: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = food)]
pub(crate) struct Food {
    pub id: i32,
    pub name: String,
    /// kcal per 100 g
    pub calories: f64,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = food)]
pub(crate) struct NewFood<'a> {
    pub name: &'a str,
    pub calories: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = recipe)]
pub(crate) struct Recipe {
    pub id: i32,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = recipe)]
pub(crate) struct NewRecipe<'a> {
    pub name: &'a str,
    pub description: &'a str,
}

// have_food / have_recipe: exactly one is expected to be set, see `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = product)]
pub(crate) struct Product {
    pub id: i32,
    pub recipe_id: i32,
    pub have_food: Option<i32>,
    pub have_recipe: Option<i32>,
    pub quantity: f64,
}

impl Product {
    pub(crate) fn source(&self) -> Option<ProductSource> {
        match (self.have_food, self.have_recipe) {
            (Some(food_id), None) => Some(ProductSource::Food(food_id)),
            (None, Some(recipe_id)) => Some(ProductSource::Recipe(recipe_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = product, treat_none_as_null = true, treat_none_as_default_value = false)]
pub(crate) struct NewProduct {
    pub recipe_id: i32,
    pub have_food: Option<i32>,
    pub have_recipe: Option<i32>,
    pub quantity: f64,
}

impl NewProduct {
    pub(crate) fn new(recipe_id: i32, source: ProductSource, quantity: f64) -> Self {
        let (have_food, have_recipe) = match source {
            ProductSource::Food(food_id) => (Some(food_id), None),
            ProductSource::Recipe(sub_recipe_id) => (None, Some(sub_recipe_id)),
        };
        Self {
            recipe_id,
            have_food,
            have_recipe,
            quantity,
        }
    }
}

/// What a product line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ProductSource {
    Food(i32),
    Recipe(i32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = record)]
pub(crate) struct Record {
    pub id: i32,
    pub date_added: NaiveDate,
    pub section: i32,
    /// grams eaten
    pub weight: f64,
    pub recipe_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = record)]
pub(crate) struct NewRecord {
    pub date_added: NaiveDate,
    pub section: i32,
    pub weight: f64,
    pub recipe_id: i32,
}

/// Meal-time bucket for records. Stored as 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Breakfast = 1,
    SecondBreakfast = 2,
    Dinner = 3,
    Lunch = 4,
    Supper = 5,
}

impl Section {
    pub(crate) const ALL: [Section; 5] = [
        Section::Breakfast,
        Section::SecondBreakfast,
        Section::Dinner,
        Section::Lunch,
        Section::Supper,
    ];

    pub(crate) fn index(self) -> i32 {
        self as i32
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Section::Breakfast => "breakfast",
            Section::SecondBreakfast => "second breakfast",
            Section::Dinner => "dinner",
            Section::Lunch => "lunch",
            Section::Supper => "supper",
        }
    }
}

impl TryFrom<i32> for Section {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Section::ALL
            .into_iter()
            .find(|section| section.index() == value)
            .ok_or(value)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_map_to_their_stored_index() {
        let indexes: Vec<i32> = Section::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4, 5]);
        assert_eq!(Section::try_from(4), Ok(Section::Lunch));
        assert_eq!(Section::try_from(0), Err(0));
        assert_eq!(Section::try_from(6), Err(6));
        assert_eq!(Section::SecondBreakfast.to_string(), "second breakfast");
    }

    #[test]
    fn product_source_requires_exactly_one_reference() {
        let mut product = Product {
            id: 1,
            recipe_id: 1,
            have_food: Some(3),
            have_recipe: None,
            quantity: 100.0,
        };
        assert_eq!(product.source(), Some(ProductSource::Food(3)));

        product.have_recipe = Some(7);
        assert_eq!(product.source(), None);

        product.have_food = None;
        assert_eq!(product.source(), Some(ProductSource::Recipe(7)));
    }
}
