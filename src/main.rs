use std::process::ExitCode;

use library_lending::{
    LendingEngine, LendingError, LendingPolicy,
    application::lending::{BatchMode, Operation, run_batch},
    domain::{Age, Book, BookId, BorrowLimit, PublishState, UserId},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_lending=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let policy = match LendingPolicy::from_env() {
        Ok(policy) => policy,
        Err(err) => {
            tracing::error!("Invalid configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(?policy, "Lending policy loaded");

    let mut engine = LendingEngine::new(policy);
    if let Err(err) = seed(&mut engine) {
        tracing::error!("Failed to seed demo library: {}", err);
        return ExitCode::FAILURE;
    }

    print_books(&engine);
    print_users(&engine);

    println!("\n=== Borrow / return script ===");
    let script = match demo_script() {
        Ok(script) => script,
        Err(err) => {
            tracing::error!("Invalid demo script: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let report = run_batch(&mut engine, script.clone(), BatchMode::ContinueOnError);
    for (index, operation) in script.iter().enumerate() {
        match report.failures.iter().find(|f| f.index == index) {
            Some(failure) => println!(
                "✗ {:?}: [{}] {}",
                operation,
                failure.error.kind(),
                failure.error
            ),
            None => println!("✓ {:?}", operation),
        }
    }

    print_books(&engine);
    print_users(&engine);

    println!("\n=== Who has what ===");
    for book in engine.catalog().books() {
        match engine.find_borrower(&book.id) {
            Some(borrower) => println!("{} -> {} ({})", book.id, borrower.name, borrower.id),
            None => println!("{} -> none", book.id),
        }
    }

    if let Err(err) = engine.check_invariants() {
        tracing::error!("{}", err);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn seed(engine: &mut LendingEngine) -> Result<(), LendingError> {
    let books = [
        ("B001", "Programming Rust", "Blandy", 2),
        ("B002", "Design Patterns", "GoF", 1),
        ("B003", "Introduction to Algorithms", "Cormen", 1),
        ("B004", "Clean Code", "Robert Martin", 1),
    ];
    for (id, title, author, quantity) in books {
        let book = Book::new(BookId::new(id)?, title, author)?;
        let book = match id {
            "B003" => book.with_age_limit(Age::from(18)),
            "B004" => book.with_publish_state(PublishState::Unpublished),
            _ => book,
        };
        engine.add_book(book, quantity)?;
    }

    let policy = *engine.policy();
    let alice = policy.new_user(UserId::new("U001")?, "Alice", Age::new(34)?)?;
    let bob = policy
        .new_user(UserId::new("U002")?, "Bob", Age::new(12)?)?
        .with_max_borrowed(BorrowLimit::new(2)?);
    engine.register_user(alice)?;
    engine.register_user(bob)?;
    Ok(())
}

fn demo_script() -> Result<Vec<Operation>, LendingError> {
    let steps = [
        ("borrow", "U001", "B001"),
        ("borrow", "U001", "B002"),
        ("borrow", "U002", "B001"),
        ("borrow", "U002", "B002"),
        ("borrow", "U002", "B003"),
        ("borrow", "U001", "B004"),
        ("borrow", "U001", "B999"),
        ("return", "U001", "B002"),
        ("return", "U001", "B002"),
        ("borrow", "U002", "B002"),
    ];

    steps
        .into_iter()
        .map(|(op, user, book)| {
            let user_id = UserId::new(user)?;
            let book_id = BookId::new(book)?;
            Ok::<_, LendingError>(match op {
                "borrow" => Operation::Borrow { user_id, book_id },
                _ => Operation::Return { user_id, book_id },
            })
        })
        .collect()
}

fn print_books(engine: &LendingEngine) {
    println!("\n=== Catalog ===");
    for book in engine.catalog().books() {
        println!("{} [stock {}]", book, engine.stock_of(&book.id));
    }
}

fn print_users(engine: &LendingEngine) {
    println!("\n=== Users ===");
    for user in engine.membership().users() {
        println!("{}", user);
        let titles: Vec<&str> = user
            .borrowed_books()
            .filter_map(|id| engine.catalog().find_book(id))
            .map(|book| book.title.as_str())
            .collect();
        if !titles.is_empty() {
            println!("  borrowed: {}", titles.join(", "));
        }
    }
}
