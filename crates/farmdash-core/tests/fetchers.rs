mod common;

use chrono::NaiveDate;
use common::{sample_posts, two_farms, ScriptedGateway};
use farmdash_core::error::{GatewayError, MutationError};
use farmdash_core::fetchers;
use farmdash_core::types::{Location, NewCrop, NewFarm, NewPost, PostCategory};
use serde_json::json;

fn maize() -> NewCrop {
    NewCrop {
        name: "Maize".into(),
        variety: Some("H614".into()),
        farm_id: "farm-a".into(),
        planting_date: NaiveDate::from_ymd_opt(2024, 3, 1),
        expected_harvest_date: NaiveDate::from_ymd_opt(2024, 7, 15),
        area: Some(1.5),
        growth_stage: None,
        notes: None,
    }
}

#[tokio::test]
async fn farms_decode_from_nested_envelope() {
    let gateway = ScriptedGateway::new().with_farms(two_farms());
    let farms = fetchers::fetch_farms(&gateway).await.unwrap();

    assert_eq!(farms.len(), 2);
    assert_eq!(farms[1].id, "farm-b");
    assert_eq!(farms[1].size, 5.0);
}

#[tokio::test]
async fn unexpected_payload_shape_is_a_decode_error() {
    let gateway = ScriptedGateway::new().with_farms(json!("nope"));
    let err = fetchers::fetch_farms(&gateway).await.unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)));
}

#[tokio::test]
async fn crops_inherit_the_requested_farm() {
    let gateway = ScriptedGateway::new().with_crops(
        "farm-z",
        json!({ "data": [{ "_id": "c9", "name": "Kale" }] }),
    );
    let crops = fetchers::fetch_crops(&gateway, Some("farm-z")).await.unwrap();

    assert_eq!(crops[0].farm_id.as_deref(), Some("farm-z"));
    assert_eq!(gateway.calls(), vec!["get_crops:farm-z"]);
}

#[tokio::test]
async fn trending_posts_are_capped() {
    let gateway = ScriptedGateway::new().with_posts(sample_posts());
    let posts = fetchers::fetch_trending_posts(&gateway, 1).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, "post-1");
}

#[tokio::test]
async fn unidentifiable_detail_records_are_skipped() {
    let gateway = ScriptedGateway::new();

    let activities = fetchers::fetch_crop_activities(&gateway, "crop-1").await.unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].crop_id, "crop-1");
    assert_eq!(activities[0].activity_type, "irrigation");

    let images = fetchers::fetch_crop_images(&gateway, "crop-1").await.unwrap();
    assert_eq!(images.len(), 1);

    let readings = fetchers::fetch_sensor_readings(&gateway, "farm-a").await.unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].value, 31.5);
    assert_eq!(readings[0].farm_id, "farm-a");

    let rules = fetchers::fetch_automation_rules(&gateway, "farm-a").await.unwrap();
    assert!(rules[0].enabled);

    let comments = fetchers::fetch_comments(&gateway, "post-1").await.unwrap();
    assert_eq!(comments[0].author.name.as_deref(), Some("Ama"));
    assert_eq!(comments[0].post_id, "post-1");
}

#[tokio::test]
async fn invalid_crop_never_reaches_the_gateway() {
    let gateway = ScriptedGateway::new();
    let mut crop = maize();
    crop.name = "  ".into();
    crop.planting_date = None;

    let err = fetchers::create_crop(&gateway, &crop).await.unwrap_err();

    let validation = match err {
        MutationError::Validation(validation) => validation,
        other => panic!("expected validation error, got {other:?}"),
    };
    assert!(validation.has_field("name"));
    assert!(validation.has_field("planting_date"));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn created_crop_is_decoded_from_envelope() {
    let gateway = ScriptedGateway::new();
    let crop = fetchers::create_crop(&gateway, &maize()).await.unwrap();

    assert_eq!(crop.id, "crop-new");
    assert_eq!(crop.farm_id.as_deref(), Some("farm-a"));
    assert!(crop.planting_date.is_some());
}

#[tokio::test]
async fn created_farm_and_post_are_decoded() {
    let gateway = ScriptedGateway::new();
    let farm = fetchers::create_farm(
        &gateway,
        &NewFarm {
            name: " Hillside ".into(),
            location: Location::FreeText {
                text: "Eldoret".into(),
            },
            size: 3.0,
        },
    )
    .await
    .unwrap();
    assert_eq!(farm.id, "farm-new");
    assert_eq!(farm.name, "Hillside");

    let post = fetchers::create_post(
        &gateway,
        &NewPost {
            content: "  Rotate beans with maize ".into(),
            category: PostCategory::Tips,
            tags: vec!["beans".into(), " beans ".into(), "".into()],
        },
    )
    .await
    .unwrap();
    assert_eq!(post.id, "post-new");
    assert_eq!(post.content, "Rotate beans with maize");
    assert_eq!(post.tags.len(), 1);
    assert_eq!(post.category, PostCategory::Tips);
}

#[tokio::test]
async fn gateway_failure_surfaces_through_mutation_error() {
    let gateway = ScriptedGateway::new();
    gateway.fail_mutations([GatewayError::Auth("expired".into())]);

    let err = fetchers::create_crop(&gateway, &maize()).await.unwrap_err();
    assert!(matches!(err, MutationError::Gateway(GatewayError::Auth(_))));
}

#[tokio::test]
async fn comment_text_is_trimmed_before_sending() {
    let gateway = ScriptedGateway::new();
    let comment = fetchers::add_comment(&gateway, "post-1", "  Agreed ")
        .await
        .unwrap()
        .expect("comment echoed");

    assert_eq!(comment.id, "c-new");
    assert_eq!(comment.text, "Agreed");
}
