use chrono::Utc;
use common::{Money, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Actor, OrderLine, OrderRequest, OrderService};
use store::{Category, InMemoryStore, Product, Store};

async fn seed_products(store: &InMemoryStore, count: usize) -> Vec<ProductId> {
    store
        .insert_category(Category {
            slug: "bench".to_string(),
            title: "Bench".to_string(),
        })
        .await
        .unwrap();

    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let id = ProductId::new();
        store
            .insert_product(Product {
                id,
                title: format!("Product {n}"),
                description: String::new(),
                price: Money::from_cents(100 * (n as i64 + 1)),
                category_slug: "bench".to_string(),
                image: None,
            })
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let products = rt.block_on(seed_products(&store, 1));
    let service = OrderService::new(store);
    let actor = Actor::user(UserId::new());

    c.bench_function("domain/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .create_order(
                        &actor,
                        OrderRequest {
                            items: vec![OrderLine {
                                product: products[0],
                                quantity: 2,
                            }],
                            notes: String::new(),
                        },
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_create_order_20_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let products = rt.block_on(seed_products(&store, 20));
    let service = OrderService::new(store);
    let actor = Actor::user(UserId::new());

    c.bench_function("domain/create_order_20_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                let items = products
                    .iter()
                    .map(|&product| OrderLine {
                        product,
                        quantity: 1,
                    })
                    .collect();
                service
                    .create_order(
                        &actor,
                        OrderRequest {
                            items,
                            notes: String::new(),
                        },
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_product_detail_with_reviews(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let products = rt.block_on(seed_products(&store, 1));

    // Pre-populate: 50 reviews from distinct authors.
    rt.block_on(async {
        use store::Review;
        for n in 0..50i16 {
            let author = UserId::new();
            store
                .insert_user(store::User {
                    id: author,
                    email: format!("u{n}@bench.example"),
                    password_hash: String::new(),
                    first_name: "Bench".to_string(),
                    last_name: format!("User{n}"),
                    is_active: true,
                    is_staff: false,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
            store
                .insert_review(Review {
                    id: common::ReviewId::new(),
                    author,
                    product: products[0],
                    text: "fine".to_string(),
                    rating: 1 + n % 5,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .await
                .unwrap();
        }
    });

    let service = domain::CatalogService::new(store);
    c.bench_function("domain/product_detail_50_reviews", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.product_detail(products[0]).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_order,
    bench_create_order_20_lines,
    bench_product_detail_with_reviews,
);
criterion_main!(benches);
