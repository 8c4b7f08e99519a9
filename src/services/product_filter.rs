//! Translation of product list query parameters into a SeaORM condition.
//!
//! Every supplied option narrows the result (logical AND); omitted options add
//! nothing. Column references are table-qualified because the list query joins
//! `categories`, which also has a `name` column.

use sea_orm::sea_query::{Expr, extension::postgres::PgExpr};
use sea_orm::{ColumnTrait, Condition};

use crate::{
    entity::{
        categories::{Column as CategoryCol, Entity as Categories},
        products::{Column, Entity as Products},
    },
    routes::params::ProductQuery,
};

/// Wraps user text in `%…%` for ILIKE, escaping the wildcard characters.
pub fn like_pattern(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + 2);
    escaped.push('%');
    for ch in raw.trim().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn product_condition(query: &ProductQuery) -> Condition {
    let mut condition = Condition::all();

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    for (value, column) in [
        (&query.name, Column::Name),
        (&query.material, Column::Material),
        (&query.color, Column::Color),
    ] {
        if let Some(text) = non_blank(value) {
            condition = condition.add(Expr::col((Products, column)).ilike(like_pattern(text)));
        }
    }

    if let Some(is_featured) = query.is_featured {
        condition = condition.add(Column::IsFeatured.eq(is_featured));
    }
    match query.in_stock {
        Some(true) => condition = condition.add(Column::Stock.gt(0)),
        Some(false) => condition = condition.add(Column::Stock.eq(0)),
        None => {}
    }

    if let Some(category) = query.category {
        condition = condition.add(Column::CategoryId.eq(category));
    }
    if let Some(category_name) = non_blank(&query.category_name) {
        condition = condition.add(
            Expr::col((Categories, CategoryCol::Name)).ilike(like_pattern(category_name)),
        );
    }

    if let Some(search) = non_blank(&query.search) {
        let pattern = like_pattern(search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Products, Column::Name)).ilike(pattern.clone()))
                .add(Expr::col((Products, Column::Material)).ilike(pattern.clone()))
                .add(Expr::col((Products, Column::Color)).ilike(pattern)),
        );
    }

    condition
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};
    use uuid::Uuid;

    fn render(query: &ProductQuery) -> String {
        Products::find()
            .filter(product_condition(query))
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn empty_query_adds_no_predicates() {
        let sql = render(&ProductQuery::default());
        let (_, from_clause) = sql.split_once(" FROM ").unwrap();
        assert!(!from_clause.contains(r#""products"."#), "{sql}");
        assert!(!from_clause.contains("ILIKE"), "{sql}");
    }

    #[test]
    fn price_range_and_stock_are_conjunctive() {
        let sql = render(&ProductQuery {
            min_price: Some(Decimal::new(5000, 2)),
            max_price: Some(Decimal::new(15000, 2)),
            in_stock: Some(true),
            ..Default::default()
        });
        assert!(sql.contains(r#""products"."price" >="#), "{sql}");
        assert!(sql.contains(r#""products"."price" <="#), "{sql}");
        assert!(sql.contains(r#""products"."stock" > 0"#), "{sql}");
        assert_eq!(sql.matches(" AND ").count(), 2, "{sql}");
        assert!(!sql.contains(" OR "), "{sql}");
    }

    #[test]
    fn out_of_stock_means_exactly_zero() {
        let sql = render(&ProductQuery {
            in_stock: Some(false),
            ..Default::default()
        });
        assert!(sql.contains(r#""products"."stock" = 0"#), "{sql}");
    }

    #[test]
    fn text_filters_are_case_insensitive_substrings() {
        let sql = render(&ProductQuery {
            material: Some("Oak".into()),
            color: Some("  ".into()),
            category_name: Some("living".into()),
            ..Default::default()
        });
        assert!(sql.contains(r#""products"."material" ILIKE '%Oak%'"#), "{sql}");
        assert!(sql.contains(r#""categories"."name" ILIKE '%living%'"#), "{sql}");
        let (_, where_clause) = sql.split_once(" WHERE ").unwrap();
        assert!(
            !where_clause.contains(r#""products"."color""#),
            "blank filters are ignored: {sql}"
        );
    }

    #[test]
    fn search_spans_name_material_and_color() {
        let sql = render(&ProductQuery {
            search: Some("walnut".into()),
            is_featured: Some(true),
            ..Default::default()
        });
        assert!(sql.contains(r#""products"."name" ILIKE '%walnut%'"#), "{sql}");
        assert!(sql.contains(r#""products"."material" ILIKE '%walnut%'"#), "{sql}");
        assert!(sql.contains(r#""products"."color" ILIKE '%walnut%'"#), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        assert!(sql.contains(r#""products"."is_featured" = TRUE"#), "{sql}");
    }

    #[test]
    fn category_id_is_exact() {
        let id = Uuid::new_v4();
        let sql = render(&ProductQuery {
            category: Some(id),
            ..Default::default()
        });
        assert!(sql.contains(r#""products"."category_id" ="#), "{sql}");
        assert!(sql.contains(&id.to_string()), "{sql}");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" sofa "), "%sofa%");
        assert_eq!(like_pattern("100%_oak"), r"%100\%\_oak%");
    }
}
