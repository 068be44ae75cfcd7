use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::error::StoreError;
use crate::forms::{self, FoodInput, FormErrors, ProductFormSet, ProductInput, RecipeInput, RecordInput};
use crate::models::{
    Food, NewFood, NewProduct, NewRecipe, NewRecord, Product, ProductSource, Recipe, Record,
    Section, ALIAS_QUANTITY,
};
use crate::schema::{food, product, recipe, record};
use crate::tracking::{Catalog, ResolveError};

const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

pub(crate) fn find_all_foods(conn: &mut SqliteConnection) -> Result<Vec<Food>, StoreError> {
    use crate::schema::food::dsl::*;

    Ok(food.order(name.asc()).select(Food::as_select()).load(conn)?)
}

pub(crate) fn find_all_recipes(conn: &mut SqliteConnection) -> Result<Vec<Recipe>, StoreError> {
    use crate::schema::recipe::dsl::*;

    Ok(recipe.order(name.asc()).select(Recipe::as_select()).load(conn)?)
}

pub(crate) fn find_recipe(conn: &mut SqliteConnection, recipe_id: i32) -> Result<Recipe, StoreError> {
    recipe::table
        .find(recipe_id)
        .select(Recipe::as_select())
        .first(conn)
        .optional()?
        .ok_or(StoreError::not_found("recipe", recipe_id))
}

pub(crate) fn find_products(
    conn: &mut SqliteConnection,
    owner_id: i32,
) -> Result<Vec<Product>, StoreError> {
    use crate::schema::product::dsl::*;

    Ok(product
        .filter(recipe_id.eq(owner_id))
        .order(id.asc())
        .select(Product::as_select())
        .load(conn)?)
}

/// Every food, recipe and product, for calorie resolution and form choices.
pub(crate) fn load_catalog(conn: &mut SqliteConnection) -> Result<Catalog, StoreError> {
    let foods = find_all_foods(conn)?;
    let recipes = find_all_recipes(conn)?;
    let products: Vec<Product> = product::table.select(Product::as_select()).load(conn)?;
    Ok(Catalog::new(foods, recipes, products))
}

pub(crate) fn find_records_on(
    conn: &mut SqliteConnection,
    date: NaiveDate,
) -> Result<Vec<Record>, StoreError> {
    use crate::schema::record::dsl::*;

    Ok(record
        .filter(date_added.eq(date))
        .order((section.asc(), id.asc()))
        .select(Record::as_select())
        .load(conn)?)
}

fn food_name_owner(conn: &mut SqliteConnection, candidate: &str) -> QueryResult<Option<i32>> {
    use crate::schema::food::dsl::*;

    food.filter(name.eq(candidate)).select(id).first(conn).optional()
}

fn recipe_name_owner(conn: &mut SqliteConnection, candidate: &str) -> QueryResult<Option<i32>> {
    use crate::schema::recipe::dsl::*;

    recipe.filter(name.eq(candidate)).select(id).first(conn).optional()
}

fn duplicate_name(kind: &str) -> StoreError {
    StoreError::Validation(FormErrors::single(
        "name",
        format!("{kind} with this name already exists."),
    ))
}

fn ensure_recipe_name_free(
    conn: &mut SqliteConnection,
    candidate: &str,
    own_recipe: Option<i32>,
) -> Result<(), StoreError> {
    match recipe_name_owner(conn, candidate)? {
        Some(owner) if Some(owner) != own_recipe => Err(duplicate_name("Recipe")),
        _ => Ok(()),
    }
}

fn ensure_food_name_free(
    conn: &mut SqliteConnection,
    candidate: &str,
    own_food: Option<i32>,
) -> Result<(), StoreError> {
    match food_name_owner(conn, candidate)? {
        Some(owner) if Some(owner) != own_food => Err(duplicate_name("Food")),
        _ => Ok(()),
    }
}

/// The unique indexes back up the name checks above.
fn name_conflict(err: StoreError) -> StoreError {
    if err.is_unique_violation() {
        duplicate_name("An entry")
    } else {
        err
    }
}

/// Checks that every product row points at rows that exist, that existing
/// rows belong to `owner`, and that a recipe does not list itself.
fn ensure_products_valid(
    conn: &mut SqliteConnection,
    products: &[ProductInput],
    owner: Option<i32>,
) -> Result<(), StoreError> {
    let mut errors = FormErrors::default();
    for line in products {
        match line.source {
            ProductSource::Food(food_id) => {
                let found = food::table
                    .find(food_id)
                    .select(food::id)
                    .first::<i32>(conn)
                    .optional()?;
                if found.is_none() {
                    errors.add(forms::product_field(line.index, "have_food"), INVALID_CHOICE);
                }
            }
            ProductSource::Recipe(sub_recipe_id) if Some(sub_recipe_id) == owner => {
                errors.add(
                    forms::product_field(line.index, "have_recipe"),
                    "A recipe cannot contain itself.",
                );
            }
            ProductSource::Recipe(sub_recipe_id) => {
                if recipe::table
                    .find(sub_recipe_id)
                    .select(recipe::id)
                    .first::<i32>(conn)
                    .optional()?
                    .is_none()
                {
                    errors.add(forms::product_field(line.index, "have_recipe"), INVALID_CHOICE);
                }
            }
        }

        if let (Some(product_id), Some(owner_id)) = (line.id, owner) {
            let belongs = product::table
                .find(product_id)
                .select(product::recipe_id)
                .first::<i32>(conn)
                .optional()?
                == Some(owner_id);
            if !belongs {
                errors.add(forms::product_field(line.index, "id"), INVALID_CHOICE);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(errors))
    }
}

/// Creates a food together with its alias recipe, so the food can be picked
/// wherever a recipe is expected.
pub(crate) fn create_food(
    conn: &mut SqliteConnection,
    input: &FoodInput,
) -> Result<(Food, Recipe), StoreError> {
    conn.transaction::<_, StoreError, _>(|conn| {
        ensure_food_name_free(conn, &input.name, None)?;
        ensure_recipe_name_free(conn, &input.name, None)?;

        let created: Food = diesel::insert_into(food::table)
            .values(NewFood {
                name: &input.name,
                calories: input.calories,
            })
            .returning(Food::as_returning())
            .get_result(conn)?;
        let alias: Recipe = diesel::insert_into(recipe::table)
            .values(NewRecipe {
                name: &input.name,
                description: "",
            })
            .returning(Recipe::as_returning())
            .get_result(conn)?;
        diesel::insert_into(product::table)
            .values(NewProduct::new(
                alias.id,
                ProductSource::Food(created.id),
                ALIAS_QUANTITY,
            ))
            .execute(conn)?;

        log::info!("created food {} with alias recipe {}", created.id, alias.id);
        Ok((created, alias))
    })
    .map_err(name_conflict)
}

/// Edits the food behind an alias recipe and keeps the alias name in step.
pub(crate) fn update_alias_food(
    conn: &mut SqliteConnection,
    alias_id: i32,
    food_id: i32,
    input: &FoodInput,
) -> Result<Food, StoreError> {
    conn.transaction::<_, StoreError, _>(|conn| {
        ensure_food_name_free(conn, &input.name, Some(food_id))?;
        ensure_recipe_name_free(conn, &input.name, Some(alias_id))?;

        let updated: Food = diesel::update(food::table.find(food_id))
            .set(NewFood {
                name: &input.name,
                calories: input.calories,
            })
            .returning(Food::as_returning())
            .get_result(conn)
            .optional()?
            .ok_or(StoreError::not_found("food", food_id))?;
        diesel::update(recipe::table.find(alias_id))
            .set(recipe::name.eq(&input.name))
            .execute(conn)?;
        Ok(updated)
    })
    .map_err(name_conflict)
}

pub(crate) fn create_recipe(
    conn: &mut SqliteConnection,
    input: &RecipeInput,
    formset: &ProductFormSet,
) -> Result<Recipe, StoreError> {
    conn.transaction::<_, StoreError, _>(|conn| {
        ensure_recipe_name_free(conn, &input.name, None)?;
        ensure_products_valid(conn, &formset.products, None)?;

        let created: Recipe = diesel::insert_into(recipe::table)
            .values(NewRecipe {
                name: &input.name,
                description: &input.description,
            })
            .returning(Recipe::as_returning())
            .get_result(conn)?;
        for line in &formset.products {
            diesel::insert_into(product::table)
                .values(NewProduct::new(created.id, line.source, line.quantity))
                .execute(conn)?;
        }

        log::info!(
            "created recipe {} with {} products",
            created.id,
            formset.products.len()
        );
        Ok(created)
    })
    .map_err(name_conflict)
}

/// Applies a recipe form plus its inline product formset: rows with an id
/// are updated, rows without are added, `deleted` ids are removed.
pub(crate) fn update_recipe(
    conn: &mut SqliteConnection,
    recipe_id: i32,
    input: &RecipeInput,
    formset: &ProductFormSet,
) -> Result<Recipe, StoreError> {
    conn.transaction::<_, StoreError, _>(|conn| {
        find_recipe(conn, recipe_id)?;
        ensure_recipe_name_free(conn, &input.name, Some(recipe_id))?;
        ensure_products_valid(conn, &formset.products, Some(recipe_id))?;

        let updated: Recipe = diesel::update(recipe::table.find(recipe_id))
            .set(NewRecipe {
                name: &input.name,
                description: &input.description,
            })
            .returning(Recipe::as_returning())
            .get_result(conn)?;

        if !formset.deleted.is_empty() {
            diesel::delete(
                product::table
                    .filter(product::recipe_id.eq(recipe_id))
                    .filter(product::id.eq_any(formset.deleted.clone())),
            )
            .execute(conn)?;
        }
        for line in &formset.products {
            let values = NewProduct::new(recipe_id, line.source, line.quantity);
            match line.id {
                Some(product_id) => diesel::update(product::table.find(product_id))
                    .set(&values)
                    .execute(conn)?,
                None => diesel::insert_into(product::table)
                    .values(&values)
                    .execute(conn)?,
            };
        }

        if find_products(conn, recipe_id)?.is_empty() {
            return Err(StoreError::Validation(FormErrors::single(
                forms::NON_FIELD,
                "A recipe needs at least one product.",
            )));
        }
        match load_catalog(conn)?.calories_per_100g(recipe_id) {
            Ok(_) => Ok(updated),
            Err(ResolveError::Cycle(_)) => Err(StoreError::Validation(FormErrors::single(
                forms::NON_FIELD,
                "A recipe cannot contain itself, directly or through another recipe.",
            ))),
            Err(other) => Err(other.into()),
        }
    })
    .map_err(name_conflict)
}

pub(crate) fn create_record(
    conn: &mut SqliteConnection,
    input: &RecordInput,
    section: Section,
) -> Result<Record, StoreError> {
    conn.transaction::<_, StoreError, _>(|conn| {
        match find_recipe(conn, input.recipe_id) {
            Ok(_) => {}
            Err(StoreError::NotFound { .. }) => {
                return Err(StoreError::Validation(FormErrors::single(
                    "recipe",
                    INVALID_CHOICE,
                )));
            }
            Err(other) => return Err(other),
        }
        let created: Record = diesel::insert_into(record::table)
            .values(NewRecord {
                date_added: input.date_added,
                section: section.index(),
                weight: input.weight,
                recipe_id: input.recipe_id,
            })
            .returning(Record::as_returning())
            .get_result(conn)?;
        Ok(created)
    })
}

/// Removes a record, returning it so callers know which day it was on.
pub(crate) fn delete_record(conn: &mut SqliteConnection, record_id: i32) -> Result<Record, StoreError> {
    diesel::delete(record::table.find(record_id))
        .returning(Record::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or(StoreError::not_found("record", record_id))
}

/// Fails with a conflict while any product still uses the food.
pub(crate) fn delete_food(conn: &mut SqliteConnection, food_id: i32) -> Result<(), StoreError> {
    let in_use = || {
        StoreError::Conflict(format!(
            "food {food_id} is still used by a recipe and cannot be deleted"
        ))
    };

    let users: i64 = product::table
        .filter(product::have_food.eq(food_id))
        .count()
        .get_result(conn)?;
    if users > 0 {
        return Err(in_use());
    }
    let deleted = diesel::delete(food::table.find(food_id))
        .execute(conn)
        .map_err(|err| {
            let err = StoreError::from(err);
            if err.is_foreign_key_violation() {
                in_use()
            } else {
                err
            }
        })?;
    if deleted == 0 {
        return Err(StoreError::not_found("food", food_id));
    }
    Ok(())
}

/// Deletes a recipe; its products and records go with it.
pub(crate) fn delete_recipe(conn: &mut SqliteConnection, recipe_id: i32) -> Result<(), StoreError> {
    let deleted = diesel::delete(recipe::table.find(recipe_id)).execute(conn)?;
    if deleted == 0 {
        return Err(StoreError::not_found("recipe", recipe_id));
    }
    Ok(())
}

/// Deletes an entry of the food list. A food alias takes its food with it,
/// unless another recipe still uses that food, in which case nothing is
/// deleted.
pub(crate) fn delete_entry(conn: &mut SqliteConnection, recipe_id: i32) -> Result<(), StoreError> {
    conn.transaction::<_, StoreError, _>(|conn| {
        let catalog = load_catalog(conn)?;
        if catalog.recipe(recipe_id).is_none() {
            return Err(StoreError::not_found("recipe", recipe_id));
        }
        let alias_of = catalog.alias_food(recipe_id).map(|food| food.id);

        delete_recipe(conn, recipe_id)?;
        if let Some(food_id) = alias_of {
            delete_food(conn, food_id)?;
        }
        log::info!("deleted recipe {recipe_id}");
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::in_memory_connection;

    fn food_input(name: &str, calories: f64) -> FoodInput {
        FoodInput {
            name: name.into(),
            calories,
        }
    }

    fn recipe_input(name: &str) -> RecipeInput {
        RecipeInput {
            name: name.into(),
            description: String::new(),
        }
    }

    fn line(index: usize, source: ProductSource, quantity: f64) -> ProductInput {
        ProductInput {
            index,
            id: None,
            source,
            quantity,
        }
    }

    fn formset(products: Vec<ProductInput>) -> ProductFormSet {
        ProductFormSet {
            products,
            deleted: vec![],
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, 24).unwrap()
    }

    fn count_products(conn: &mut SqliteConnection) -> i64 {
        product::table.count().get_result(conn).unwrap()
    }

    fn count_records(conn: &mut SqliteConnection) -> i64 {
        record::table.count().get_result(conn).unwrap()
    }

    #[test]
    fn creating_a_food_adds_its_alias_recipe() {
        let conn = &mut in_memory_connection();
        let (banana, alias) = create_food(conn, &food_input("Banana", 89.0)).unwrap();

        assert_eq!(alias.name, "Banana");
        let products = find_products(conn, alias.id).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].have_food, Some(banana.id));
        assert_eq!(products[0].have_recipe, None);

        let catalog = load_catalog(conn).unwrap();
        assert_eq!(catalog.alias_food(alias.id), Some(&banana));
        assert_eq!(catalog.calories_per_100g(alias.id), Ok(89.0));
    }

    #[test]
    fn duplicate_names_are_validation_errors() {
        let conn = &mut in_memory_connection();
        create_food(conn, &food_input("Banana", 89.0)).unwrap();

        let err = create_food(conn, &food_input("Banana", 90.0)).unwrap_err();
        let StoreError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.field("name").len(), 1);

        let err = create_recipe(
            conn,
            &recipe_input("Banana"),
            &formset(vec![line(0, ProductSource::Food(1), 10.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(find_all_foods(conn).unwrap().len(), 1);
        assert_eq!(find_all_recipes(conn).unwrap().len(), 1);
    }

    #[test]
    fn food_used_by_a_product_cannot_be_deleted() {
        let conn = &mut in_memory_connection();
        let (banana, _) = create_food(conn, &food_input("Banana", 89.0)).unwrap();

        let err = delete_food(conn, banana.id).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");
        assert_eq!(find_all_foods(conn).unwrap(), vec![banana]);
        assert_eq!(count_products(conn), 1);
    }

    #[test]
    fn store_restrict_rule_is_reported_as_a_foreign_key_violation() {
        let conn = &mut in_memory_connection();
        let (banana, _) = create_food(conn, &food_input("Banana", 89.0)).unwrap();

        let err: StoreError = diesel::delete(food::table.find(banana.id))
            .execute(conn)
            .unwrap_err()
            .into();
        assert!(err.is_foreign_key_violation(), "{err:?}");
    }

    fn assert_name_taken(err: StoreError) {
        let StoreError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.field("name").len(), 1);
    }

    #[test]
    fn renaming_onto_a_taken_name_is_a_validation_error() {
        let conn = &mut in_memory_connection();
        let (banana, banana_alias) = create_food(conn, &food_input("Banana", 89.0)).unwrap();
        create_food(conn, &food_input("Oats", 389.0)).unwrap();
        let banana_line = || formset(vec![line(0, ProductSource::Food(banana.id), 150.0)]);
        create_recipe(conn, &recipe_input("Porridge"), &banana_line()).unwrap();
        let smoothie = create_recipe(conn, &recipe_input("Smoothie"), &banana_line()).unwrap();

        let err = update_recipe(conn, smoothie.id, &recipe_input("Porridge"), &banana_line())
            .unwrap_err();
        assert_name_taken(err);
        assert_eq!(find_recipe(conn, smoothie.id).unwrap().name, "Smoothie");
        assert_eq!(find_products(conn, smoothie.id).unwrap().len(), 1);

        let err = update_alias_food(conn, banana_alias.id, banana.id, &food_input("Oats", 90.0))
            .unwrap_err();
        assert_name_taken(err);
        let err =
            update_alias_food(conn, banana_alias.id, banana.id, &food_input("Porridge", 90.0))
                .unwrap_err();
        assert_name_taken(err);

        let foods = find_all_foods(conn).unwrap();
        let unchanged = foods.iter().find(|f| f.id == banana.id).unwrap();
        assert_eq!(unchanged.name, "Banana");
        assert_eq!(unchanged.calories, 89.0);
        assert_eq!(find_recipe(conn, banana_alias.id).unwrap().name, "Banana");
    }

    #[test]
    fn deleting_a_recipe_cascades_to_products_and_records() {
        let conn = &mut in_memory_connection();
        let (_, banana) = create_food(conn, &food_input("Banana", 89.0)).unwrap();
        let (_, oats) = create_food(conn, &food_input("Oats", 389.0)).unwrap();
        let porridge = create_recipe(
            conn,
            &recipe_input("Porridge"),
            &formset(vec![
                line(0, ProductSource::Recipe(oats.id), 60.0),
                line(1, ProductSource::Recipe(banana.id), 120.0),
            ]),
        )
        .unwrap();
        let input = RecordInput {
            recipe_id: porridge.id,
            weight: 300.0,
            date_added: day(),
        };
        create_record(conn, &input, Section::Breakfast).unwrap();
        assert_eq!(count_products(conn), 4);

        delete_recipe(conn, porridge.id).unwrap();
        assert_eq!(count_products(conn), 2);
        assert_eq!(count_records(conn), 0);

        // removing a sub-recipe drops the product lines that used it
        let bowl = create_recipe(
            conn,
            &recipe_input("Bowl"),
            &formset(vec![
                line(0, ProductSource::Recipe(oats.id), 60.0),
                line(1, ProductSource::Recipe(banana.id), 60.0),
            ]),
        )
        .unwrap();
        delete_recipe(conn, oats.id).unwrap();
        let left = find_products(conn, bowl.id).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].have_recipe, Some(banana.id));
    }

    #[test]
    fn invalid_product_reference_persists_nothing() {
        let conn = &mut in_memory_connection();
        let (banana, _) = create_food(conn, &food_input("Banana", 89.0)).unwrap();

        let err = create_recipe(
            conn,
            &recipe_input("Smoothie"),
            &formset(vec![
                line(0, ProductSource::Food(banana.id), 100.0),
                line(1, ProductSource::Food(999), 50.0),
            ]),
        )
        .unwrap_err();
        let StoreError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.field("products-1-have_food").len(), 1);
        assert_eq!(find_all_recipes(conn).unwrap().len(), 1);
        assert_eq!(count_products(conn), 1);
    }

    #[test]
    fn editing_through_the_alias_mutates_the_food() {
        let conn = &mut in_memory_connection();
        let (banana, alias) = create_food(conn, &food_input("Banana", 89.0)).unwrap();

        let updated =
            update_alias_food(conn, alias.id, banana.id, &food_input("Plantain", 122.0)).unwrap();
        assert_eq!(updated.id, banana.id);
        assert_eq!(find_all_foods(conn).unwrap(), vec![updated]);
        assert_eq!(find_recipe(conn, alias.id).unwrap().name, "Plantain");
        let catalog = load_catalog(conn).unwrap();
        assert_eq!(catalog.alias_food(alias.id).map(|f| f.id), Some(banana.id));
    }

    #[test]
    fn recipe_edit_adds_updates_and_deletes_products() {
        let conn = &mut in_memory_connection();
        let (banana, _) = create_food(conn, &food_input("Banana", 89.0)).unwrap();
        let (oats, _) = create_food(conn, &food_input("Oats", 389.0)).unwrap();
        let (milk, _) = create_food(conn, &food_input("Milk", 64.0)).unwrap();
        let porridge = create_recipe(
            conn,
            &recipe_input("Porridge"),
            &formset(vec![
                line(0, ProductSource::Food(oats.id), 60.0),
                line(1, ProductSource::Food(banana.id), 120.0),
            ]),
        )
        .unwrap();
        let existing = find_products(conn, porridge.id).unwrap();

        let edit = ProductFormSet {
            products: vec![
                ProductInput {
                    index: 0,
                    id: Some(existing[0].id),
                    source: ProductSource::Food(oats.id),
                    quantity: 80.0,
                },
                line(2, ProductSource::Food(milk.id), 200.0),
            ],
            deleted: vec![existing[1].id],
        };
        let updated = update_recipe(
            conn,
            porridge.id,
            &RecipeInput {
                name: "Milk porridge".into(),
                description: "warm".into(),
            },
            &edit,
        )
        .unwrap();
        assert_eq!(updated.name, "Milk porridge");

        let products = find_products(conn, porridge.id).unwrap();
        let summary: Vec<(Option<i32>, f64)> =
            products.iter().map(|p| (p.have_food, p.quantity)).collect();
        assert_eq!(summary, vec![(Some(oats.id), 80.0), (Some(milk.id), 200.0)]);
    }

    #[test]
    fn recipe_edit_rejects_cycles_and_foreign_products() {
        let conn = &mut in_memory_connection();
        let (banana, alias) = create_food(conn, &food_input("Banana", 89.0)).unwrap();
        let inner = create_recipe(
            conn,
            &recipe_input("Inner"),
            &formset(vec![line(0, ProductSource::Food(banana.id), 10.0)]),
        )
        .unwrap();
        let outer = create_recipe(
            conn,
            &recipe_input("Outer"),
            &formset(vec![line(0, ProductSource::Recipe(inner.id), 10.0)]),
        )
        .unwrap();

        let err = update_recipe(
            conn,
            inner.id,
            &recipe_input("Inner"),
            &formset(vec![line(0, ProductSource::Recipe(outer.id), 10.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)), "{err:?}");
        assert_eq!(find_products(conn, inner.id).unwrap().len(), 1);

        let alias_product = find_products(conn, alias.id).unwrap()[0].id;
        let err = update_recipe(
            conn,
            outer.id,
            &recipe_input("Outer"),
            &formset(vec![ProductInput {
                index: 0,
                id: Some(alias_product),
                source: ProductSource::Food(banana.id),
                quantity: 5.0,
            }]),
        )
        .unwrap_err();
        let StoreError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.field("products-0-id").len(), 1);
    }

    #[test]
    fn records_are_listed_per_day() {
        let conn = &mut in_memory_connection();
        let (_, alias) = create_food(conn, &food_input("Banana", 89.0)).unwrap();
        for (date, section) in [
            (day(), Section::Supper),
            (day(), Section::Breakfast),
            (day().succ_opt().unwrap(), Section::Lunch),
        ] {
            let input = RecordInput {
                recipe_id: alias.id,
                weight: 100.0,
                date_added: date,
            };
            create_record(conn, &input, section).unwrap();
        }

        let records = find_records_on(conn, day()).unwrap();
        let sections: Vec<i32> = records.iter().map(|r| r.section).collect();
        assert_eq!(sections, vec![1, 5]);

        let removed = delete_record(conn, records[0].id).unwrap();
        assert_eq!(removed.date_added, day());
        assert_eq!(find_records_on(conn, day()).unwrap().len(), 1);
    }

    #[test]
    fn record_for_missing_recipe_is_a_validation_error() {
        let conn = &mut in_memory_connection();
        let input = RecordInput {
            recipe_id: 42,
            weight: 100.0,
            date_added: day(),
        };
        let err = create_record(conn, &input, Section::Lunch).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn deleting_an_alias_entry_removes_the_food_unless_it_is_used() {
        let conn = &mut in_memory_connection();
        let (banana, banana_alias) = create_food(conn, &food_input("Banana", 89.0)).unwrap();
        let (_, oats_alias) = create_food(conn, &food_input("Oats", 389.0)).unwrap();
        create_recipe(
            conn,
            &recipe_input("Smoothie"),
            &formset(vec![line(0, ProductSource::Food(banana.id), 200.0)]),
        )
        .unwrap();

        delete_entry(conn, oats_alias.id).unwrap();
        assert_eq!(find_all_foods(conn).unwrap(), vec![banana.clone()]);

        let err = delete_entry(conn, banana_alias.id).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");
        assert_eq!(find_recipe(conn, banana_alias.id).unwrap().name, "Banana");
        assert_eq!(find_all_foods(conn).unwrap(), vec![banana]);

        let err = delete_entry(conn, 999).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
