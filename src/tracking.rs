//! Calorie resolution and daily totals.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{Food, Product, ProductSource, Recipe, Record, Section};

/// The tracker's clock runs at UTC+3.
const TRACKER_UTC_OFFSET_SECONDS: i32 = 3 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum ResolveError {
    #[error("recipe {0} does not exist")]
    UnknownRecipe(i32),
    #[error("food {0} does not exist")]
    UnknownFood(i32),
    #[error("recipe {0} contains itself")]
    Cycle(i32),
    #[error("product {0} must reference exactly one food or recipe")]
    AmbiguousProduct(i32),
}

/// Everything needed to turn recipes into calories.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    foods: HashMap<i32, Food>,
    recipes: HashMap<i32, Recipe>,
    products: HashMap<i32, Vec<Product>>,
}

impl Catalog {
    pub(crate) fn new(foods: Vec<Food>, recipes: Vec<Recipe>, products: Vec<Product>) -> Self {
        let mut by_recipe: HashMap<i32, Vec<Product>> = HashMap::new();
        for product in products {
            by_recipe.entry(product.recipe_id).or_default().push(product);
        }
        for lines in by_recipe.values_mut() {
            lines.sort_by_key(|product| product.id);
        }
        Self {
            foods: foods.into_iter().map(|food| (food.id, food)).collect(),
            recipes: recipes.into_iter().map(|recipe| (recipe.id, recipe)).collect(),
            products: by_recipe,
        }
    }

    pub(crate) fn recipe(&self, recipe_id: i32) -> Option<&Recipe> {
        self.recipes.get(&recipe_id)
    }

    /// Recipes ordered by name.
    pub(crate) fn recipes(&self) -> Vec<&Recipe> {
        let mut recipes: Vec<&Recipe> = self.recipes.values().collect();
        recipes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        recipes
    }

    /// Foods ordered by name.
    pub(crate) fn foods(&self) -> Vec<&Food> {
        let mut foods: Vec<&Food> = self.foods.values().collect();
        foods.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        foods
    }

    pub(crate) fn products(&self, recipe_id: i32) -> &[Product] {
        self.products
            .get(&recipe_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The food a recipe stands in for, when the recipe is a food alias:
    /// a single product pointing at a food of the same name.
    pub(crate) fn alias_food(&self, recipe_id: i32) -> Option<&Food> {
        let recipe = self.recipes.get(&recipe_id)?;
        match self.products(recipe_id) {
            [only] => match only.source()? {
                ProductSource::Food(food_id) => self
                    .foods
                    .get(&food_id)
                    .filter(|food| food.name == recipe.name),
                ProductSource::Recipe(_) => None,
            },
            _ => None,
        }
    }

    /// Effective kcal per 100 g of a recipe: the quantity-weighted mean of
    /// its products, resolving sub-recipes recursively. A product's
    /// `quantity` is taken as grams of that ingredient in the recipe.
    pub(crate) fn calories_per_100g(&self, recipe_id: i32) -> Result<f64, ResolveError> {
        self.resolve(recipe_id, &mut HashSet::new(), &mut HashMap::new())
    }

    fn resolve(
        &self,
        recipe_id: i32,
        visiting: &mut HashSet<i32>,
        resolved: &mut HashMap<i32, f64>,
    ) -> Result<f64, ResolveError> {
        if let Some(calories) = resolved.get(&recipe_id) {
            return Ok(*calories);
        }
        if !self.recipes.contains_key(&recipe_id) {
            return Err(ResolveError::UnknownRecipe(recipe_id));
        }
        if !visiting.insert(recipe_id) {
            return Err(ResolveError::Cycle(recipe_id));
        }

        let mut grams = 0.0;
        let mut kcal = 0.0;
        for product in self.products(recipe_id) {
            let per_100g = match product
                .source()
                .ok_or(ResolveError::AmbiguousProduct(product.id))?
            {
                ProductSource::Food(food_id) => {
                    self.foods
                        .get(&food_id)
                        .ok_or(ResolveError::UnknownFood(food_id))?
                        .calories
                }
                ProductSource::Recipe(sub_recipe_id) => {
                    self.resolve(sub_recipe_id, visiting, resolved)?
                }
            };
            grams += product.quantity;
            kcal += product.quantity * per_100g;
        }

        visiting.remove(&recipe_id);
        let calories = if grams > 0.0 { kcal / grams } else { 0.0 };
        resolved.insert(recipe_id, calories);
        Ok(calories)
    }
}

pub(crate) fn record_total(weight: f64, calories_per_100g: f64) -> f64 {
    weight * (calories_per_100g / 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RecordLine {
    pub id: i32,
    pub recipe_id: i32,
    pub recipe_name: String,
    pub weight: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SectionSummary {
    pub index: i32,
    pub name: &'static str,
    pub total: f64,
    pub records: Vec<RecordLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DaySummary {
    pub date: NaiveDate,
    pub sections: Vec<SectionSummary>,
    pub total: f64,
}

/// Buckets one day's records by section and sums their calories. Records
/// dated on other days are ignored.
pub(crate) fn summarize_day(
    date: NaiveDate,
    records: &[Record],
    catalog: &Catalog,
) -> Result<DaySummary, ResolveError> {
    let mut sections = Vec::with_capacity(Section::ALL.len());
    for section in Section::ALL {
        let mut lines = Vec::new();
        for record in records
            .iter()
            .filter(|r| r.date_added == date && r.section == section.index())
        {
            let recipe = catalog
                .recipe(record.recipe_id)
                .ok_or(ResolveError::UnknownRecipe(record.recipe_id))?;
            let per_100g = catalog.calories_per_100g(record.recipe_id)?;
            lines.push(RecordLine {
                id: record.id,
                recipe_id: recipe.id,
                recipe_name: recipe.name.clone(),
                weight: record.weight,
                total: record_total(record.weight, per_100g),
            });
        }
        sections.push(SectionSummary {
            index: section.index(),
            name: section.name(),
            total: lines.iter().map(|line| line.total).sum(),
            records: lines,
        });
    }

    let total = sections.iter().map(|section| section.total).sum();
    Ok(DaySummary {
        date,
        sections,
        total,
    })
}

/// Today's date on the tracker's UTC+3 clock.
pub(crate) fn today(now: DateTime<Utc>) -> NaiveDate {
    let offset = FixedOffset::east_opt(TRACKER_UTC_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset).date_naive()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn food(id: i32, name: &str, calories: f64) -> Food {
        Food {
            id,
            name: name.into(),
            calories,
        }
    }

    fn recipe(id: i32, name: &str) -> Recipe {
        Recipe {
            id,
            name: name.into(),
            description: String::new(),
        }
    }

    fn product(id: i32, recipe_id: i32, source: ProductSource, quantity: f64) -> Product {
        let (have_food, have_recipe) = match source {
            ProductSource::Food(food_id) => (Some(food_id), None),
            ProductSource::Recipe(sub) => (None, Some(sub)),
        };
        Product {
            id,
            recipe_id,
            have_food,
            have_recipe,
            quantity,
        }
    }

    fn record(id: i32, date: NaiveDate, section: Section, weight: f64, recipe_id: i32) -> Record {
        Record {
            id,
            date_added: date,
            section: section.index(),
            weight,
            recipe_id,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, 24).unwrap()
    }

    /// Banana and oats as food aliases, porridge = 60 g oats + 120 g banana,
    /// and a breakfast bowl of porridge plus banana.
    fn pantry() -> Catalog {
        Catalog::new(
            vec![food(1, "Banana", 89.0), food(2, "Oats", 389.0)],
            vec![
                recipe(10, "Banana"),
                recipe(11, "Oats"),
                recipe(12, "Porridge"),
                recipe(13, "Bowl"),
            ],
            vec![
                product(100, 10, ProductSource::Food(1), 100.0),
                product(101, 11, ProductSource::Food(2), 100.0),
                product(102, 12, ProductSource::Food(2), 60.0),
                product(103, 12, ProductSource::Food(1), 120.0),
                product(104, 13, ProductSource::Recipe(12), 180.0),
                product(105, 13, ProductSource::Recipe(10), 20.0),
            ],
        )
    }

    #[test]
    fn alias_resolves_to_its_food() {
        let catalog = pantry();
        assert_eq!(catalog.alias_food(10).map(|f| f.id), Some(1));
        assert_eq!(catalog.alias_food(12), None);
        assert_eq!(catalog.calories_per_100g(10), Ok(89.0));
    }

    #[test]
    fn single_product_recipe_with_another_name_is_not_an_alias() {
        let catalog = Catalog::new(
            vec![food(1, "Banana", 89.0)],
            vec![recipe(10, "Half banana")],
            vec![product(100, 10, ProductSource::Food(1), 50.0)],
        );
        assert_eq!(catalog.alias_food(10), None);
        assert_eq!(catalog.calories_per_100g(10), Ok(89.0));
    }

    #[test]
    fn composite_recipes_are_quantity_weighted() {
        let catalog = pantry();
        let porridge = (60.0 * 389.0 + 120.0 * 89.0) / 180.0;
        let porridge_actual = catalog.calories_per_100g(12).unwrap();
        assert!((porridge_actual - porridge).abs() < 1e-9);

        let bowl = (180.0 * porridge + 20.0 * 89.0) / 200.0;
        let bowl_actual = catalog.calories_per_100g(13).unwrap();
        assert!((bowl_actual - bowl).abs() < 1e-9);
    }

    #[test]
    fn recipe_without_products_has_no_calories() {
        let catalog = Catalog::new(vec![], vec![recipe(1, "Water")], vec![]);
        assert_eq!(catalog.calories_per_100g(1), Ok(0.0));
    }

    #[test]
    fn cycles_and_dangling_references_are_errors() {
        let catalog = Catalog::new(
            vec![],
            vec![recipe(1, "A"), recipe(2, "B"), recipe(3, "C")],
            vec![
                product(1, 1, ProductSource::Recipe(2), 10.0),
                product(2, 2, ProductSource::Recipe(1), 10.0),
                product(3, 3, ProductSource::Food(99), 10.0),
            ],
        );
        assert_eq!(catalog.calories_per_100g(1), Err(ResolveError::Cycle(1)));
        assert_eq!(
            catalog.calories_per_100g(3),
            Err(ResolveError::UnknownFood(99))
        );
        assert_eq!(
            catalog.calories_per_100g(42),
            Err(ResolveError::UnknownRecipe(42))
        );
    }

    #[test]
    fn banana_breakfast_totals_133_5() {
        let summary = summarize_day(
            day(),
            &[record(1, day(), Section::Breakfast, 150.0, 10)],
            &pantry(),
        )
        .unwrap();
        assert_eq!(summary.sections[0].name, "breakfast");
        assert!((summary.sections[0].total - 133.5).abs() < 1e-9);
        assert_eq!(summary.sections[0].records[0].recipe_name, "Banana");
        assert!((summary.total - 133.5).abs() < 1e-9);
    }

    #[test]
    fn day_total_is_the_sum_of_section_totals() {
        let other_day = day().succ_opt().unwrap();
        let records = vec![
            record(1, day(), Section::Breakfast, 150.0, 10),
            record(2, day(), Section::Breakfast, 50.0, 11),
            record(3, day(), Section::Lunch, 200.0, 12),
            record(4, day(), Section::Supper, 100.0, 11),
            record(5, other_day, Section::Supper, 1000.0, 11),
        ];
        let summary = summarize_day(day(), &records, &pantry()).unwrap();

        let indexes: Vec<i32> = summary.sections.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4, 5]);
        assert_eq!(summary.sections[0].records.len(), 2);
        assert!(summary.sections[1].records.is_empty());
        assert_eq!(summary.sections[1].total, 0.0);
        assert!((summary.sections[4].total - 389.0).abs() < 1e-9);

        let section_sum: f64 = summary.sections.iter().map(|s| s.total).sum();
        assert!((summary.total - section_sum).abs() < 1e-9);
        let porridge = pantry().calories_per_100g(12).unwrap();
        let expected = 133.5 + 194.5 + record_total(200.0, porridge) + 389.0;
        assert!((summary.total - expected).abs() < 1e-9);
    }

    #[test]
    fn today_runs_three_hours_ahead_of_utc() {
        let late = Utc.with_ymd_and_hms(2021, 6, 24, 21, 30, 0).unwrap();
        assert_eq!(today(late), NaiveDate::from_ymd_opt(2021, 6, 25).unwrap());
        let early = Utc.with_ymd_and_hms(2021, 6, 24, 20, 59, 59).unwrap();
        assert_eq!(today(early), day());
    }
}
