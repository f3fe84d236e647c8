//! Demonstration of a todo app driven by dispatched actions

use std::sync::Arc;
use std::time::Duration;

use agendum::{Action, Dispatcher, Reducer, INIT_TYPE};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug)]
struct TodoItem {
    id: usize,
    title: String,
    completed: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum TodoFilter {
    All,
    Active,
    Completed,
}

#[derive(Clone, Debug)]
struct AppState {
    todos: Vec<TodoItem>,
    filter: TodoFilter,
}

#[derive(Clone, Debug)]
enum TodoAction {
    Init,
    Add(String),
    Toggle(usize),
    SetFilter(TodoFilter),
}

impl Action for TodoAction {
    fn init() -> Self {
        TodoAction::Init
    }

    fn name(&self) -> &str {
        match self {
            TodoAction::Init => INIT_TYPE,
            TodoAction::Add(_) => "ADD_TODO",
            TodoAction::Toggle(_) => "TOGGLE_TODO",
            TodoAction::SetFilter(_) => "SET_FILTER",
        }
    }
}

impl AppState {
    fn new() -> Self {
        Self {
            todos: Vec::new(),
            filter: TodoFilter::All,
        }
    }

    fn filtered_todos(&self) -> Vec<&TodoItem> {
        match self.filter {
            TodoFilter::All => self.todos.iter().collect(),
            TodoFilter::Active => self.todos.iter().filter(|t| !t.completed).collect(),
            TodoFilter::Completed => self.todos.iter().filter(|t| t.completed).collect(),
        }
    }

    fn stats(&self) -> (usize, usize, usize) {
        let total = self.todos.len();
        let completed = self.todos.iter().filter(|t| t.completed).count();
        let active = total - completed;
        (total, active, completed)
    }
}

fn todos() -> Reducer<AppState, TodoAction> {
    Reducer::named("todos", |state: &Arc<AppState>, action: &TodoAction| {
        let mut next = (**state).clone();
        match action {
            TodoAction::Init => return Arc::clone(state),
            TodoAction::Add(title) => {
                let id = next.todos.len();
                next.todos.push(TodoItem {
                    id,
                    title: title.clone(),
                    completed: false,
                });
            }
            TodoAction::Toggle(id) => match next.todos.iter_mut().find(|t| t.id == *id) {
                Some(todo) => todo.completed = !todo.completed,
                None => return Arc::clone(state),
            },
            TodoAction::SetFilter(filter) => {
                if state.filter == *filter {
                    return Arc::clone(state);
                }
                next.filter = filter.clone();
            }
        }
        Arc::new(next)
    })
}

fn print_todos(state: &AppState) {
    for todo in state.filtered_todos() {
        let status = if todo.completed { "✓" } else { " " };
        println!("   [{}] {}", status, todo.title);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Dispatcher Example: Todo App ===\n");

    let dispatcher = Dispatcher::builder().logging(true).build();
    let reducer = todos();
    let store = dispatcher.reduce(&reducer, AppState::new());

    // Subscribe to state changes
    println!("1. Setting up subscriber");
    let _subscription = store.subscribe(|state| {
        let (total, active, completed) = state.stats();
        println!(
            "   [Store Update] Total: {}, Active: {}, Completed: {}",
            total, active, completed
        );
    });
    let mut changes = store.changes();
    changes.next().await;

    println!("\n2. Adding todos");
    let add = dispatcher.wrap_action(TodoAction::Add);
    for title in ["Learn Rust", "Build reactive library", "Write documentation"] {
        add(title.to_string());
        changes.next().await;
    }

    println!("\n3. Current todos:");
    print_todos(&store.get());

    println!("\n4. Completing two todos from a thunk");
    let later = dispatcher.dispatch_thunk(|emit| {
        emit.emit(TodoAction::Toggle(0));
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            emit.emit(TodoAction::Toggle(1));
        })
    });
    let _ = later.await;
    changes.next().await;
    changes.next().await;

    println!("\n5. Filtering to show only active todos");
    dispatcher.dispatch(TodoAction::SetFilter(TodoFilter::Active));
    changes.next().await;
    print_todos(&store.get());

    println!("\n6. Filtering to show completed todos");
    dispatcher.dispatch(TodoAction::SetFilter(TodoFilter::Completed));
    if let Some(state) = changes.next().await {
        print_todos(&state);
    }

    println!("\n7. Final statistics:");
    let (total, active, completed) = store.read(|state| state.stats());
    println!("   Total: {}", total);
    println!("   Active: {}", active);
    println!("   Completed: {}", completed);

    if let Some(state) = dispatcher.get_state(&reducer) {
        println!("   Filter: {:?}", state.filter);
    }

    println!("\n✓ Example complete!");
}
