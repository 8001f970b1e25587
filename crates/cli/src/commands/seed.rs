//! Seed the catalog with demo categories, products and variants.
//!
//! The catalog is read from YAML, either the built-in demo catalog or a file
//! passed with `--file`. Seeding is re-runnable: categories are matched by
//! slug and products whose slug already exists are skipped.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use piffy_admin::db::{
    self, CategoryRepository, NewCategory, NewProduct, NewVariant, ProductRepository,
    RepositoryError, VariantRepository,
};
use piffy_core::{Category, DEFAULT_PRODUCT_STOCK, Product, ProductVariant, Slug};

use super::migrate;

const DEMO_CATALOG: &str = include_str!("../../seed/catalog.yaml");

/// A category and its products.
#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default = "default_stock")]
    pub stock: i32,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub variants: Vec<SeedVariant>,
}

#[derive(Debug, Deserialize)]
pub struct SeedVariant {
    pub name: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub price_adjust: Decimal,
}

const fn default_stock() -> i32 {
    DEFAULT_PRODUCT_STOCK
}

/// Counts reported after a seeding run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories_created: usize,
    pub products_created: usize,
    pub products_skipped: usize,
    pub variants_created: usize,
}

/// Parse a YAML catalog.
///
/// # Errors
///
/// Returns the YAML error if the document does not match the catalog shape.
pub fn parse_catalog(content: &str) -> Result<Vec<SeedCategory>, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Check every entry against the catalog rules enforced by the admin API.
///
/// Returns one message per problem; an empty list means the catalog is valid.
#[must_use]
pub fn validate_catalog(catalog: &[SeedCategory]) -> Vec<String> {
    let mut errors = Vec::new();

    for category in catalog {
        let name = category.name.trim();
        if name.is_empty() || name.len() > Category::MAX_NAME_LENGTH {
            errors.push(format!("category {name:?}: name must be 1-100 characters"));
        }
        if let Err(e) = Slug::from_title(name) {
            errors.push(format!("category {name:?}: {e}"));
        }

        for product in &category.products {
            let title = product.title.trim();
            if title.is_empty() || title.len() > Product::MAX_TITLE_LENGTH {
                errors.push(format!("product {title:?}: title must be 1-255 characters"));
            }
            if let Err(e) = Slug::from_title(title) {
                errors.push(format!("product {title:?}: {e}"));
            }
            if product.price.is_sign_negative() {
                errors.push(format!("product {title:?}: price must not be negative"));
            }
            if product.stock < 0 {
                errors.push(format!("product {title:?}: stock must not be negative"));
            }

            for variant in &product.variants {
                let variant_name = variant.name.trim();
                if variant_name.is_empty() || variant_name.len() > ProductVariant::MAX_NAME_LENGTH
                {
                    errors.push(format!(
                        "product {title:?}: variant name must be 1-100 characters"
                    ));
                }
                if variant.stock < 0 {
                    errors.push(format!(
                        "product {title:?}: variant {variant_name:?} stock must not be negative"
                    ));
                }
            }
        }
    }

    errors
}

/// Seed the catalog from `file`, or from the built-in demo catalog.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, validation fails,
/// or a database operation fails for a reason other than a duplicate slug.
pub async fn catalog(file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let content = match file {
        Some(path) => {
            info!(path = %path.display(), "Loading catalog from file");
            tokio::fs::read_to_string(path).await?
        }
        None => {
            info!("Loading built-in demo catalog");
            DEMO_CATALOG.to_string()
        }
    };

    let catalog = parse_catalog(&content)?;
    let errors = validate_catalog(&catalog);
    if !errors.is_empty() {
        for err in &errors {
            warn!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let database_url = migrate::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let summary = insert_catalog(&pool, &catalog).await?;

    info!("Seeding complete!");
    info!("  Categories created: {}", summary.categories_created);
    info!("  Products created: {}", summary.products_created);
    info!("  Products skipped (already exist): {}", summary.products_skipped);
    info!("  Variants created: {}", summary.variants_created);

    Ok(())
}

async fn insert_catalog(
    pool: &sqlx::PgPool,
    catalog: &[SeedCategory],
) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let categories = CategoryRepository::new(pool);
    let products = ProductRepository::new(pool);
    let variants = VariantRepository::new(pool);

    let mut existing: HashMap<String, Category> = categories
        .list()
        .await?
        .into_iter()
        .map(|c| (c.slug.clone(), c))
        .collect();
    let mut summary = SeedSummary::default();

    for entry in catalog {
        let slug = Slug::from_title(&entry.name)?;

        let category_id = if let Some(category) = existing.get(slug.as_str()) {
            category.id
        } else {
            let category = categories
                .create(&NewCategory {
                    name: entry.name.trim().to_string(),
                    slug: slug.clone(),
                    description: entry.description.clone(),
                })
                .await?;
            summary.categories_created += 1;
            let id = category.id;
            existing.insert(slug.into_inner(), category);
            id
        };

        for product in &entry.products {
            let slug = Slug::from_title(&product.title)?;

            let created = products
                .create(&NewProduct {
                    category_id,
                    title: product.title.trim().to_string(),
                    slug,
                    description: product.description.clone(),
                    price: product.price.round_dp(2),
                    stock: product.stock,
                    featured: product.featured,
                })
                .await;

            let created = match created {
                Ok(created) => created,
                Err(RepositoryError::Conflict(_)) => {
                    info!(title = %product.title, "Product exists, skipping");
                    summary.products_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            summary.products_created += 1;

            for variant in &product.variants {
                variants
                    .create(
                        created.id,
                        &NewVariant {
                            name: variant.name.trim().to_string(),
                            stock: variant.stock,
                            price_adjust: variant.price_adjust.round_dp(2),
                        },
                    )
                    .await?;
                summary.variants_created += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_catalog_is_valid() {
        let catalog = parse_catalog(DEMO_CATALOG).unwrap();
        assert!(!catalog.is_empty());
        assert!(validate_catalog(&catalog).is_empty());
    }

    #[test]
    fn test_defaults_applied() {
        let catalog = parse_catalog(
            r#"
- name: Prints
  products:
    - title: Fox
      price: "12.5"
      variants:
        - name: A4
"#,
        )
        .unwrap();

        let product = &catalog[0].products[0];
        assert_eq!(product.stock, DEFAULT_PRODUCT_STOCK);
        assert!(!product.featured);
        assert_eq!(product.price, Decimal::new(125, 1));
        assert_eq!(product.variants[0].stock, 0);
        assert_eq!(product.variants[0].price_adjust, Decimal::ZERO);
    }

    #[test]
    fn test_validation_reports_each_problem() {
        let catalog = parse_catalog(
            r#"
- name: "!!!"
  products:
    - title: ""
      price: "-1.00"
      stock: -2
"#,
        )
        .unwrap();

        let errors = validate_catalog(&catalog);
        assert!(errors.iter().any(|e| e.contains("category \"!!!\"")));
        assert!(errors.iter().any(|e| e.contains("title must be")));
        assert!(errors.iter().any(|e| e.contains("price must not be negative")));
        assert!(errors.iter().any(|e| e.contains("stock must not be negative")));
    }

    #[test]
    fn test_missing_price_is_parse_error() {
        let result = parse_catalog(
            r"
- name: Prints
  products:
    - title: Fox
",
        );
        assert!(result.is_err());
    }
}
