use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};

use marquee::aggregator::Completeness;
use marquee::config::Config;
use marquee::error::CatalogError;
use marquee::mapping::POSTER_PLACEHOLDER;
use marquee::registry::{parse_file, DiscoverQuery, Registry};
use marquee::tmdb::{MetadataSource, TmdbClient};
use marquee::types::MediaKind;
use marquee::Marquee;

fn client(server: &Server) -> TmdbClient {
    TmdbClient::new(&server.url(), "test-key", "en-US", "US", Duration::from_secs(5)).unwrap()
}

fn movie_json(id: u64, title: &str) -> String {
    format!(
        r#"{{"id":{id},"title":"{title}","poster_path":"/p{id}.jpg","backdrop_path":null,
            "vote_average":7.26,"release_date":"2012-04-25","overview":"","genres":[{{"id":28,"name":"Action"}}]}}"#
    )
}

#[tokio::test]
async fn details_send_key_language_and_appendix() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/movie/24428")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("api_key".into(), "test-key".into()),
            Matcher::UrlEncoded("language".into(), "en-US".into()),
            Matcher::UrlEncoded("append_to_response".into(), "credits,videos".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(movie_json(24428, "The Avengers"))
        .create_async()
        .await;

    let details = client(&server).details(MediaKind::Movie, 24428).await.unwrap();
    mock.assert_async().await;
    assert_eq!(details.record.title.as_deref(), Some("The Avengers"));
    assert!(details.record.has_genre(28));
}

#[tokio::test]
async fn status_codes_map_to_errors() {
    let mut server = Server::new_async().await;
    server.mock("GET", "/movie/1").match_query(Matcher::Any).with_status(404).create_async().await;
    server.mock("GET", "/movie/2").match_query(Matcher::Any).with_status(503).create_async().await;
    server
        .mock("GET", "/movie/3")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let c = client(&server);
    assert!(c.details(MediaKind::Movie, 1).await.unwrap_err().is_not_found());
    assert!(matches!(
        c.details(MediaKind::Movie, 2).await.unwrap_err(),
        CatalogError::Status { status: 503, .. }
    ));
    assert!(matches!(c.details(MediaKind::Movie, 3).await.unwrap_err(), CatalogError::Decode(_)));
}

#[tokio::test]
async fn discover_sends_joined_filters() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/discover/tv")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("with_networks".into(), "213|1024".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"page":2,"results":[{"id":66732,"name":"Stranger Things"}],"total_pages":9,"total_results":170}"#)
        .create_async()
        .await;

    let query = DiscoverQuery { with_networks: vec![213, 1024], ..Default::default() };
    let page = client(&server).discover(MediaKind::Tv, &query, 2).await.unwrap();
    mock.assert_async().await;
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].name.as_deref(), Some("Stranger Things"));
}

const FIXED: &str = r#"
    version = 1
    id = "heroes"
    title = "Heroes"
    [strategy]
    kind = "fixed-ids"
    movies = [1, 2, 3]
"#;

fn catalog(server: &Server) -> Marquee {
    let mut registry = Registry::empty();
    for g in parse_file("heroes.toml", FIXED).unwrap() {
        registry.insert(g);
    }
    let config = Config { api_key: "test-key".into(), api_base_url: server.url(), ..Config::default() };
    Marquee::with_source(Arc::new(client(server)), config, registry)
}

#[tokio::test]
async fn fixed_id_grouping_survives_one_failing_title() {
    let mut server = Server::new_async().await;
    for (id, title) in [(1, "First"), (3, "Third")] {
        server
            .mock("GET", format!("/movie/{id}").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(movie_json(id, title))
            .create_async()
            .await;
    }
    server.mock("GET", "/movie/2").match_query(Matcher::Any).with_status(500).create_async().await;

    let result = catalog(&server).franchise("heroes").await.unwrap();
    assert_eq!(result.completeness(), Completeness::Partial);
    let ids: Vec<u64> = result.data.movies.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 3]);
    let first = &result.data.movies[0];
    assert_eq!(first.rating, "7.3");
    assert_eq!(first.year, "2012");
    assert_eq!(first.image, "https://image.tmdb.org/t/p/w500/p1.jpg");
    assert!(result.data.tv_shows.is_empty());
}

#[tokio::test]
async fn grouping_with_every_title_failing_is_unavailable() {
    let mut server = Server::new_async().await;
    server.mock("GET", Matcher::Regex(r"^/movie/\d+$".into())).match_query(Matcher::Any).with_status(500).create_async().await;

    match catalog(&server).franchise("heroes").await {
        Err(CatalogError::Unavailable { failures }) => assert_eq!(failures.len(), 3),
        other => panic!("expected Unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn multi_search_drops_people() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/search/multi")
        .match_query(Matcher::UrlEncoded("query".into(), "batman".into()))
        .with_status(200)
        .with_body(
            r#"{"page":1,"results":[
                {"id":268,"media_type":"movie","title":"Batman"},
                {"id":3894,"media_type":"person","name":"Batman Fan"},
                {"id":2098,"media_type":"tv","name":"Batman: The Animated Series","poster_path":null}
            ]}"#,
        )
        .create_async()
        .await;

    let items = catalog(&server).search("batman", 1).await.unwrap();
    let kinds: Vec<(u64, MediaKind)> = items.iter().map(|i| i.identity()).collect();
    assert_eq!(kinds, vec![(268, MediaKind::Movie), (2098, MediaKind::Tv)]);
    assert_eq!(items[1].image, POSTER_PLACEHOLDER);
}

#[tokio::test]
async fn malformed_record_is_skipped_not_fatal() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/discover/movie")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"{"page":1,"results":[
                {"id":10,"title":"Kept","vote_average":"6.4"},
                {"id":11,"title":"Broken","genre_ids":{"oops":true}},
                {"id":null,"title":"Anonymous"}
            ],"total_pages":1,"total_results":3}"#,
        )
        .create_async()
        .await;

    let query = DiscoverQuery { with_genres: vec![18], ..Default::default() };
    let page = client(&server).discover(MediaKind::Movie, &query, 1).await.unwrap();
    let ids: Vec<u64> = page.results.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![10, 0]);

    let items = catalog(&server).by_genre(MediaKind::Movie, 18, 1).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!((items[0].title.as_str(), items[0].rating.as_str()), ("Kept", "6.4"));
}
