//! Docker-backed probe tests
//!
//! Each test starts a throwaway container with testcontainers and points the
//! matching probe at it. Run with `cargo test --features container_tests`.

#![cfg(feature = "container_tests")]

use devprobe::config::{MongoConfig, PostgresConfig, RabbitMqConfig, RedisConfig};
use devprobe::probes::{MongoProbe, PostgresProbe, Probe, RabbitMqProbe, RedisProbe};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, Image};
use testcontainers_modules::mongo::Mongo;
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::rabbitmq::RabbitMq;
use testcontainers_modules::redis::Redis;

async fn host_and_port<I: Image>(container: &ContainerAsync<I>, port: u16) -> (String, u16) {
    let host = container.get_host().await.expect("container host").to_string();
    let port = container.get_host_port_ipv4(port).await.expect("container port");
    (host, port)
}

#[tokio::test]
async fn test_postgres_probe_against_container() {
    let container = Postgres::default().start().await.expect("start postgres");
    let (host, port) = host_and_port(&container, 5432).await;

    let probe = PostgresProbe::new(PostgresConfig {
        host,
        port,
        password: "postgres".to_string(),
        ..Default::default()
    });

    let first = probe.run().await.expect("first run");
    assert_eq!(first.summary, "inserted id 1, table holds 1 row(s)");

    let second = probe.run().await.expect("second run");
    assert_eq!(second.summary, "inserted id 2, table holds 2 row(s)");
    assert_eq!(second.data.unwrap()["rows"][1]["name"], "Person");
}

#[tokio::test]
async fn test_redis_probe_against_container() {
    let container = Redis::default().start().await.expect("start redis");
    let (host, port) = host_and_port(&container, 6379).await;

    let detail = RedisProbe::new(RedisConfig { host, port }).run().await.expect("redis run");
    assert_eq!(detail.summary, "test = value123");
}

#[tokio::test]
async fn test_mongo_probe_against_container() {
    let container = Mongo::default().start().await.expect("start mongo");
    let (host, port) = host_and_port(&container, 27017).await;

    let probe = MongoProbe::new(MongoConfig {
        uri: format!("mongodb://{}:{}", host, port),
        ..Default::default()
    });

    let detail = probe.run().await.expect("mongo run");
    let documents = detail.data.unwrap()["documents"].as_array().cloned().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["name"], "Person");
}

#[tokio::test]
async fn test_rabbitmq_probe_against_container() {
    let container = RabbitMq::default().start().await.expect("start rabbitmq");
    let (host, port) = host_and_port(&container, 5672).await;

    let probe = RabbitMqProbe::new(RabbitMqConfig { host, port, ..Default::default() });

    let detail = probe.run().await.expect("rabbitmq run");
    assert_eq!(detail.summary, "published to 'test-queue'");
    if detail.warning.is_none() {
        let data = detail.data.unwrap();
        assert_eq!(data["sent"], data["received"]);
    }
}
