mod common;

use baby_kingdom_api::{
    entity::products,
    error::AppError,
    services::product_service,
};
use common::{NewProduct, create_product};
use sea_orm::{ActiveModelTrait, Set};

#[tokio::test]
async fn generated_sku_skips_codes_in_use() {
    let state = common::test_state().await;
    let existing = create_product(&state, NewProduct::default()).await;
    let mut active: products::ActiveModel = existing.into();
    active.sku = Set(Some("TOY-AAAAAA".into()));
    active.update(&state.orm).await.expect("set sku");

    let mut candidates = ["TOY-AAAAAA", "TOY-BBBBBB"].into_iter();
    let sku = product_service::unused_sku(&state, || {
        candidates.next().unwrap_or("TOY-CCCCCC").to_string()
    })
    .await
    .expect("sku");
    assert_eq!(sku, "TOY-BBBBBB");
}

#[tokio::test]
async fn generated_sku_gives_up_when_every_draw_collides() {
    let state = common::test_state().await;
    let existing = create_product(&state, NewProduct::default()).await;
    let mut active: products::ActiveModel = existing.into();
    active.sku = Set(Some("TOY-AAAAAA".into()));
    active.update(&state.orm).await.expect("set sku");

    let mut draws = 0;
    let err = product_service::unused_sku(&state, || {
        draws += 1;
        "TOY-AAAAAA".to_string()
    })
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(draws, 5);
}
