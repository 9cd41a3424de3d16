use futures_workpool::{Channel, MultiplexedReader, Selected};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();
  info!("--- Multiplexed Read Example ---");

  let primary = Channel::<u32>::new(4).expect("capacity is non-zero");
  let secondary = Channel::<u32>::new(4).expect("capacity is non-zero");
  for value in [1, 2, 2, 3] {
    primary.try_send(value).expect("primary has room");
  }

  let mut polling_reader = MultiplexedReader::new()
    .with_source(primary.clone())
    .with_source(secondary.clone())
    .with_default(|| info!("Nothing ready, default branch taken."));

  for _ in 0..6 {
    match polling_reader.select().await {
      Selected::Item { source, item } => info!("Received {} from channel {}", item, source),
      Selected::Default => {}
      Selected::Closed => break,
    }
  }

  let producer = {
    let secondary = secondary.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(200)).await;
      secondary.send(42).await.expect("secondary is open");
      secondary.close();
    })
  };

  primary.close();
  let mut waiting_reader = MultiplexedReader::new().with_source(primary).with_source(secondary);
  loop {
    match waiting_reader.select().await {
      Selected::Item { source, item } => info!("Woke with {} from channel {}", item, source),
      Selected::Default => unreachable!("no default configured"),
      Selected::Closed => {
        info!("All channels closed and drained.");
        break;
      }
    }
  }

  producer.await.expect("producer panicked");
  info!("--- Multiplexed Read Example End ---");
}
