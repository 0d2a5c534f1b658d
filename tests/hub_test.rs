// Hub behavior across the server, the hub loop and per-connection queues

use std::sync::Arc;

use chat_hub::config::ServerConfig;
use chat_hub::core::connection::Connection;
use chat_hub::core::message::ChatMessage;
use chat_hub::core::message_types::ClientCommand;
use chat_hub::core::server::ChatServer;

fn message(id: u64) -> ChatMessage {
    ChatMessage {
        chat_id: 5,
        id,
        sender_id: "bob".to_string(),
        content: format!("message {}", id),
        timestamp: 1_700_000_000,
        read: false,
    }
}

#[tokio::test]
async fn test_slow_consumer_is_evicted_without_blocking_others() {
    let server = ChatServer::with_memory_presence(ServerConfig::default()).unwrap();

    let (slow, _slow_rx) = Connection::new("slow", 1);
    let slow = Arc::new(slow);
    let (fast, mut fast_rx) = Connection::new("fast", 8);
    let fast = Arc::new(fast);

    for conn in [&slow, &fast] {
        assert!(server.handle().register(conn.clone()).await.unwrap());
        server
            .handle_command(conn, ClientCommand::Subscribe { topic: 5 })
            .await
            .unwrap();
    }

    let first = server.publish_message(message(1)).await.unwrap();
    assert_eq!(first.delivered, 2);

    // The slow reader never drains, so its single slot is still taken
    let second = server.publish_message(message(2)).await.unwrap();
    assert_eq!(second.delivered, 1);
    assert_eq!(second.evicted, vec![slow.id()]);

    assert!(slow.is_closed());
    assert!(!server.hub().is_registered(slow.id()).unwrap());
    assert!(slow.topics().unwrap().is_empty());
    assert_eq!(server.hub().subscribers(5).unwrap(), vec![fast.id()]);

    assert!(fast_rx.recv().await.unwrap().contains("message 1"));
    assert!(fast_rx.recv().await.unwrap().contains("message 2"));

    // An evicted connection cannot come back
    assert!(!server.handle().register(slow.clone()).await.unwrap());
    assert!(server
        .handle_command(&slow, ClientCommand::Subscribe { topic: 5 })
        .await
        .is_err());
}

#[tokio::test]
async fn test_evicted_reader_sees_end_of_stream_after_draining() {
    let server = ChatServer::with_memory_presence(ServerConfig::default()).unwrap();
    let (conn, mut rx) = Connection::new("alice", 1);
    let conn = Arc::new(conn);
    server.handle().register(conn.clone()).await.unwrap();
    server
        .handle_command(&conn, ClientCommand::Subscribe { topic: 5 })
        .await
        .unwrap();

    server.publish_message(message(1)).await.unwrap();
    let report = server.publish_message(message(2)).await.unwrap();
    assert_eq!(report.evicted.len(), 1);

    assert!(rx.recv().await.unwrap().contains("message 1"));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_dropping_server_tears_down_connections() {
    let server = ChatServer::with_memory_presence(ServerConfig::default()).unwrap();
    let hub = server.hub().clone();
    let (conn, mut rx) = Connection::new("alice", 4);
    let conn = Arc::new(conn);
    server.handle().register(conn.clone()).await.unwrap();

    drop(server);

    // The loop notices the last handle is gone and closes every queue
    assert!(rx.recv().await.is_none());
    assert!(conn.is_closed());
    assert_eq!(hub.connection_count().unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_subscribers_and_publishers() {
    let server = Arc::new(ChatServer::with_memory_presence(ServerConfig::default()).unwrap());
    let mut receivers = Vec::new();

    for i in 0..20 {
        let (conn, rx) = Connection::new(format!("user{}", i), 64);
        let conn = Arc::new(conn);
        server.handle().register(conn.clone()).await.unwrap();
        server
            .handle_command(&conn, ClientCommand::Subscribe { topic: 5 })
            .await
            .unwrap();
        receivers.push((conn, rx));
    }

    let mut publishers = Vec::new();
    for p in 0..4u64 {
        let server = server.clone();
        publishers.push(tokio::spawn(async move {
            for n in 0..10u64 {
                server.publish_message(message(p * 100 + n)).await.unwrap();
            }
        }));
    }
    for publisher in publishers {
        publisher.await.unwrap();
    }

    for (_conn, rx) in receivers.iter_mut() {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 40);
    }
    assert_eq!(server.stats().unwrap(), (20, 1));
}
