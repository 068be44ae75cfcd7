diesel::table! {
    food (id) {
        id -> Integer,
        name -> Text,
        calories -> Double,
    }
}

diesel::table! {
    recipe (id) {
        id -> Integer,
        name -> Text,
        description -> Text,
    }
}

diesel::table! {
    product (id) {
        id -> Integer,
        recipe_id -> Integer,
        have_food -> Nullable<Integer>,
        have_recipe -> Nullable<Integer>,
        quantity -> Double,
    }
}

diesel::table! {
    record (id) {
        id -> Integer,
        date_added -> Date,
        section -> Integer,
        weight -> Double,
        recipe_id -> Integer,
    }
}

diesel::joinable!(product -> food (have_food));
diesel::joinable!(record -> recipe (recipe_id));

diesel::allow_tables_to_appear_in_same_query!(food, product, recipe, record);
