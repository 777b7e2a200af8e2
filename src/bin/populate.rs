//! Seed the database with sample categories and pages
//!
//! Safe to run repeatedly: categories that already exist are skipped.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rango::{
    cache::MemoryCache,
    config::Config,
    db::{
        self,
        repositories::{SqlxCategoryRepository, SqlxPageRepository},
    },
    services::{CategoryService, PageService},
};

struct SeedPage {
    title: &'static str,
    url: &'static str,
    views: i64,
}

struct SeedCategory {
    name: &'static str,
    views: i64,
    likes: i64,
    pages: &'static [SeedPage],
}

const SEED: &[SeedCategory] = &[
    SeedCategory {
        name: "Python",
        views: 128,
        likes: 64,
        pages: &[
            SeedPage {
                title: "Official Python Tutorial",
                url: "http://docs.python.org/3/tutorial/",
                views: 42,
            },
            SeedPage {
                title: "How to Think like a Computer Scientist",
                url: "http://www.greenteapress.com/thinkpython/",
                views: 17,
            },
            SeedPage {
                title: "Learn Python in 10 Minutes",
                url: "http://www.korokithakis.net/tutorials/python/",
                views: 9,
            },
        ],
    },
    SeedCategory {
        name: "Django",
        views: 64,
        likes: 32,
        pages: &[
            SeedPage {
                title: "Official Django Tutorial",
                url: "https://docs.djangoproject.com/en/2.1/intro/tutorial01/",
                views: 33,
            },
            SeedPage {
                title: "Django Rocks",
                url: "http://www.djangorocks.com/",
                views: 12,
            },
            SeedPage {
                title: "How to Tango with Django",
                url: "http://www.tangowithdjango.com/",
                views: 25,
            },
        ],
    },
    SeedCategory {
        name: "Other Frameworks",
        views: 32,
        likes: 16,
        pages: &[
            SeedPage {
                title: "Bottle",
                url: "http://bottlepy.org/docs/dev/",
                views: 6,
            },
            SeedPage {
                title: "Flask",
                url: "http://flask.pocoo.org",
                views: 8,
            },
        ],
    },
];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rango=info,populate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load_with_env(Path::new("config.yml"))?;
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let categories = CategoryService::new(
        SqlxCategoryRepository::boxed(pool.clone()),
        Arc::new(MemoryCache::new()),
    );
    let pages = PageService::new(SqlxPageRepository::boxed(pool));

    let (added, skipped) = populate(&categories, &pages).await?;
    tracing::info!("Populated {} categories ({} already present)", added, skipped);

    for category in categories.list().await? {
        for page in pages.list_by_category(category.id).await? {
            println!("- {} - {}", category.name, page.title);
        }
    }

    Ok(())
}

/// Insert every seed category missing from the database, returning
/// `(added, skipped)`
async fn populate(categories: &CategoryService, pages: &PageService) -> Result<(usize, usize)> {
    let mut added = 0;
    let mut skipped = 0;

    for seed in SEED {
        let slug = rango::services::generate_slug(seed.name);
        if categories.get_by_slug(&slug).await?.is_some() {
            tracing::info!("Category {} already exists, skipping", seed.name);
            skipped += 1;
            continue;
        }

        let category = categories
            .create(seed.name)
            .await
            .with_context(|| format!("Failed to add category {}", seed.name))?;
        categories
            .set_counters(category.id, seed.views, seed.likes)
            .await?;

        for seed_page in seed.pages {
            let page = pages
                .create(category.id, seed_page.title, seed_page.url)
                .await
                .with_context(|| format!("Failed to add page {}", seed_page.title))?;
            pages.set_views(page.id, seed_page.views).await?;
        }
        added += 1;
    }

    Ok((added, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_populate_is_idempotent() {
        let pool = db::create_test_pool().await.unwrap();
        db::migrations::run_migrations(&pool).await.unwrap();
        let categories = CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
        );
        let pages = PageService::new(SqlxPageRepository::boxed(pool));

        assert_eq!(populate(&categories, &pages).await.unwrap(), (3, 0));
        assert_eq!(populate(&categories, &pages).await.unwrap(), (0, 3));

        let top = categories.top_by_likes(5).await.unwrap();
        let names: Vec<&str> = top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Python", "Django", "Other Frameworks"]);

        let python = categories.get_by_slug("python").await.unwrap().unwrap();
        assert_eq!(python.views, 128);
        assert_eq!(pages.list_by_category(python.id).await.unwrap().len(), 3);
    }
}
