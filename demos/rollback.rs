//! Optimistic updates that are rolled back when the server says no

use std::sync::Arc;
use std::time::Duration;

use agendum::{Action, Agenda, AgendaError, Dispatcher, Reducer};
use futures::{stream, StreamExt};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
#[error("server rejected `{0}`")]
struct Rejected(String);

#[derive(Clone, Debug)]
enum Cart {
    Init,
    Add(&'static str),
    Confirmed(&'static str),
}

impl Action for Cart {
    fn init() -> Self {
        Cart::Init
    }

    fn name(&self) -> &str {
        match self {
            Cart::Init => "_INIT_",
            Cart::Add(_) => "ADD_ITEM",
            Cart::Confirmed(_) => "CONFIRMED",
        }
    }
}

fn items() -> Reducer<Vec<&'static str>, Cart> {
    Reducer::optional(|items: &Vec<&'static str>, action: &Cart| match action {
        Cart::Add(item) => Some([items.as_slice(), &[*item]].concat()),
        _ => None,
    })
}

fn confirmed() -> Reducer<usize, Cart> {
    Reducer::optional(|count: &usize, action: &Cart| match action {
        Cart::Confirmed(_) => Some(count + 1),
        _ => None,
    })
}

/// Add `item` right away, then confirm it with a pretend server round trip.
fn checkout(item: &'static str, accept: bool) -> Agenda<Cart> {
    let response = async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if accept {
            Ok(Cart::Confirmed(item))
        } else {
            Err(AgendaError::new(Rejected(item.to_string())))
        }
    };
    Agenda::from_stream(stream::once(async move { Ok(Cart::Add(item)) }).chain(stream::once(response)))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Dispatcher Example: Rollback ===\n");

    let dispatcher = Dispatcher::builder().logging(true).build();
    let cart = dispatcher.reduce(&items().with_name("cart"), Vec::new());
    let orders = dispatcher.reduce(&confirmed().with_name("orders"), 0);

    let mut changes = cart.changes();
    let mut confirmations = orders.changes();
    changes.next().await;
    confirmations.next().await;

    println!("1. Two checkouts in flight, the second one will be rejected");
    dispatcher.schedule([checkout("book", true)]);
    dispatcher.schedule([checkout("lamp", false)]);

    println!("\n2. Cart while waiting for the server:");
    let mut optimistic = false;
    while let Some(state) = changes.next().await {
        println!("   {:?}", state);
        if state.contains(&"lamp") {
            optimistic = true;
        } else if optimistic {
            // The rejected item is gone, the accepted one stays.
            break;
        }
    }
    confirmations.next().await;

    println!("\n3. Final state:");
    println!("   Cart: {:?}", cart.get());
    println!("   Confirmed orders: {}", orders.get());

    println!("\n✓ Example complete!");
}
