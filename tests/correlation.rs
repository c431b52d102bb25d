//! Client-side correlation tests against a scripted server.
//!
//! The fake server speaks the wire protocol directly so tests can control
//! response order, arity, and connection loss.

use std::time::Duration;

use tokio::net::TcpListener;
use wirecall::codec::Value;
use wirecall::config::Runtime;
use wirecall::protocol::Message;
use wirecall::transport::{BoxedReader, BoxedWriter};
use wirecall::{Client, RpcError};

struct FakeServer {
    reader: BoxedReader,
    writer: BoxedWriter,
}

impl FakeServer {
    async fn read(&mut self) -> Message {
        Message::read_from(&mut self.reader).await.unwrap()
    }

    async fn reply(&mut self, request: &Message, outputs: &[Value]) {
        let runtime = Runtime::for_header(&request.header);
        let payload = runtime.pack(outputs).unwrap();
        Message::response(request.header, request.seq, payload)
            .write_to(&mut self.writer)
            .await
            .unwrap();
    }
}

fn first_arg(request: &Message) -> Value {
    Runtime::for_header(&request.header)
        .unpack(&request.payload)
        .unwrap()
        .into_iter()
        .next()
        .unwrap_or(Value::Null)
}

/// Bind a listener, connect a client, and hand back both ends.
async fn pair() -> (Client, FakeServer) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (client, accepted) = tokio::join!(Client::connect(&addr), listener.accept());
    let (stream, _) = accepted.unwrap();
    let (reader, writer) = stream.into_split();

    (
        client.unwrap(),
        FakeServer {
            reader: Box::new(reader),
            writer: Box::new(writer),
        },
    )
}

#[tokio::test]
async fn test_responses_in_reverse_order_reach_their_callers() {
    let (client, mut server) = pair().await;
    let stub = client.stub::<(u64,), u64>("Math.Echo").unwrap();

    let calls: Vec<_> = (0..8u64)
        .map(|n| {
            let stub = stub.clone();
            tokio::spawn(async move { (n, stub.call((n,)).await) })
        })
        .collect();

    let mut requests = Vec::new();
    for _ in 0..8 {
        requests.push(server.read().await);
    }
    assert_eq!(client.pending_calls(), 8);

    for request in requests.iter().rev() {
        let arg = first_arg(request);
        server.reply(request, &[arg, Value::Null]).await;
    }

    for call in calls {
        let (n, result) = call.await.unwrap();
        assert_eq!(result.unwrap(), n);
    }
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_sequence_numbers_are_unique() {
    let (client, mut server) = pair().await;

    let calls: Vec<_> = (0..16)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call_values("A", "B", Vec::new()).await })
        })
        .collect();

    let mut seen = std::collections::HashSet::new();
    let mut requests = Vec::new();
    for _ in 0..16 {
        let request = server.read().await;
        assert_eq!(request.object, "A");
        assert_eq!(request.method, "B");
        assert!(seen.insert(request.seq));
        requests.push(request);
    }
    for request in &requests {
        server.reply(request, &[Value::Null, Value::Null]).await;
    }
    for call in calls {
        call.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_short_output_list_yields_zero_value() {
    let (client, mut server) = pair().await;

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.call::<_, String>("User.SayHello", ("hi",)).await })
    };

    let request = server.read().await;
    server.reply(&request, &[Value::from("only one")]).await;

    assert_eq!(call.await.unwrap().unwrap(), "");
}

#[tokio::test]
async fn test_call_values_returns_raw_outputs() {
    let (client, mut server) = pair().await;

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.call_values("User", "Raw", vec![Value::from(1)]).await })
    };

    let request = server.read().await;
    let outputs = [Value::from(1), Value::from(2), Value::from(3)];
    server.reply(&request, &outputs).await;

    assert_eq!(call.await.unwrap().unwrap(), outputs.to_vec());
}

#[tokio::test]
async fn test_connection_loss_fails_every_pending_call() {
    let (client, mut server) = pair().await;

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call::<_, String>("User.SayHello", ("x",)).await })
        })
        .collect();

    for _ in 0..3 {
        server.read().await;
    }
    drop(server);

    for call in calls {
        assert!(matches!(call.await.unwrap(), Err(RpcError::ServerUnavailable)));
    }
    assert_eq!(client.pending_calls(), 0);
    assert!(client.is_server_shutdown());

    // Later calls fail fast instead of hanging.
    let started = std::time::Instant::now();
    assert!(matches!(
        client.call::<_, String>("User.SayHello", ("y",)).await,
        Err(RpcError::ServerUnavailable)
    ));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_timeout_removes_pending_entry_and_late_reply_is_dropped() {
    let (client, mut server) = pair().await;
    let stub = client.stub::<(u64,), u64>("Math.Echo").unwrap();

    let err = stub
        .call_timeout((1,), Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Timeout));
    assert_eq!(client.pending_calls(), 0);

    // Answer the abandoned call late, then serve a fresh one.
    let late = server.read().await;
    server.reply(&late, &[Value::from(1), Value::Null]).await;

    let next = {
        let stub = stub.clone();
        tokio::spawn(async move { stub.call((2,)).await })
    };
    let request = server.read().await;
    server.reply(&request, &[first_arg(&request), Value::Null]).await;

    assert_eq!(next.await.unwrap().unwrap(), 2);
}

#[tokio::test]
async fn test_dropped_call_future_removes_pending_entry() {
    let (client, mut server) = pair().await;

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.call::<_, u64>("Math.Echo", (1u64,)).await })
    };
    server.read().await;
    assert_eq!(client.pending_calls(), 1);

    call.abort();
    let _ = call.await;
    assert_eq!(client.pending_calls(), 0);
}

#[tokio::test]
async fn test_close_fails_waiting_calls() {
    let (client, mut server) = pair().await;

    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.call::<_, u64>("Math.Echo", (1u64,)).await })
    };
    server.read().await;

    client.close().await;
    assert!(matches!(call.await.unwrap(), Err(RpcError::ServerUnavailable)));
    assert!(client.is_closed());
}

#[tokio::test]
async fn test_response_honours_server_codec_choice() {
    use wirecall::protocol::{Compression, Serialization};

    let (client, mut server) = pair().await;
    let call = {
        let client = client.clone();
        tokio::spawn(async move { client.call::<_, String>("User.SayHello", ("hi",)).await })
    };

    // Reply with a different codec than the request used; the client
    // decodes by the response header.
    let request = server.read().await;
    let runtime = Runtime::new(Serialization::Json, Compression::Gzip);
    let header = runtime.header(wirecall::protocol::MessageType::Response, request.header.version);
    let payload = runtime.pack(&[Value::from("hi"), Value::Null]).unwrap();
    Message::response(header, request.seq, payload)
        .write_to(&mut server.writer)
        .await
        .unwrap();

    assert_eq!(call.await.unwrap().unwrap(), "hi");
}
