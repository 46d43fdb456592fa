mod common;

use common::*;
use proptest::prelude::*;
use surety_ledger::InMemoryLedger;
use surety_service::GovernanceFacade;
use surety_types::{Amount, FlightKey, FlightOutcome};

const OUTCOMES: [FlightOutcome; 4] = [
    FlightOutcome::OnTime,
    FlightOutcome::DelayedByCarrier,
    FlightOutcome::DelayedByWeather,
    FlightOutcome::Unknown,
];

const ACCOUNTS: [&str; 15] = [
    "authority",
    "oracle",
    "a0",
    "a1",
    "a2",
    "a3",
    "a4",
    "a5",
    "a6",
    "a7",
    "p1",
    "p2",
    "p3",
    "p4",
    "surety-escrow",
];

#[derive(Debug, Clone)]
enum Op {
    Apply(usize, usize),
    Vote(usize, usize),
    Fund(usize, u64),
    Purchase(usize, usize, u64),
    StatusRequest(usize, usize),
    Resolve(usize, usize),
    Withdraw(usize),
    SetOperational(bool),
}

fn op_strategy() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            (0usize..8, 0usize..8).prop_map(|(c, s)| Op::Apply(c, s)),
            (0usize..8, 0usize..8).prop_map(|(c, v)| Op::Vote(c, v)),
            (0usize..8, 0u64..15).prop_map(|(a, n)| Op::Fund(a, n)),
            (1usize..5, 0usize..4, 0u64..12).prop_map(|(p, f, n)| Op::Purchase(p, f, n)),
            (1usize..5, 0usize..4).prop_map(|(p, f)| Op::StatusRequest(p, f)),
            (0usize..4, 0usize..OUTCOMES.len()).prop_map(|(f, o)| Op::Resolve(f, o)),
            (1usize..5).prop_map(Op::Withdraw),
            any::<bool>().prop_map(Op::SetOperational),
        ],
        0..40,
    )
}

fn airline(i: usize) -> surety_types::Identity {
    id(&format!("a{i}"))
}

fn passenger(i: usize) -> surety_types::Identity {
    id(&format!("p{i}"))
}

fn flight_of(i: usize) -> FlightKey {
    FlightKey::new(format!("a{i}"), "FS1234", DEPARTURE)
}

fn balances(ledger: &InMemoryLedger) -> Vec<Amount> {
    ACCOUNTS.iter().map(|name| balance(ledger, name)).collect()
}

async fn run_op(facade: &GovernanceFacade, op: &Op) -> Result<(), surety_service::SuretyError> {
    match *op {
        Op::Apply(c, s) => facade
            .apply_and_maybe_register(&airline(s), &airline(c))
            .await
            .map(|_| ()),
        Op::Vote(c, v) => facade
            .vote_for_airline(&airline(v), &airline(c))
            .await
            .map(|_| ()),
        Op::Fund(a, n) => facade
            .fund_airline(&airline(a), &airline(a), Amount::units(n))
            .await
            .map(|_| ()),
        Op::Purchase(p, f, n) => facade
            .purchase(&passenger(p), flight_of(f), Amount::units(n))
            .await
            .map(|_| ()),
        Op::StatusRequest(p, f) => facade
            .request_flight_status(&passenger(p), flight_of(f))
            .await
            .map(|_| ()),
        Op::Resolve(f, o) => facade
            .resolve(&id("oracle"), flight_of(f), OUTCOMES[o])
            .await
            .map(|_| ()),
        Op::Withdraw(p) => facade.withdraw(&passenger(p)).await.map(|_| ()),
        Op::SetOperational(on) => facade.set_operational(&id("authority"), on).await,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn failed_calls_leave_journal_and_ledger_untouched(ops in op_strategy()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let ledger = funded_ledger();
            // Thin wallets so purchases and funding regularly bounce.
            ledger.open_account("p3", Amount::units(2)).unwrap();
            ledger.open_account("p4", Amount::ZERO).unwrap();

            let facade = facade(ledger.clone());
            facade
                .authorize_oracle(&id("authority"), &id("oracle"))
                .await
                .unwrap();

            for op in &ops {
                let journal_before = facade.journal().await.len();
                let balances_before = balances(&ledger);

                let result = run_op(&facade, op).await;

                let journal_after = facade.journal().await.len();
                if result.is_err() {
                    prop_assert_eq!(journal_after, journal_before, "{:?}", op);
                    prop_assert_eq!(balances(&ledger), balances_before, "{:?}", op);
                } else {
                    prop_assert!(journal_after <= journal_before + 1, "{:?}", op);
                }

                let exist = facade.exist_airlines_count().await;
                let registered = facade.registered_airlines_count().await;
                let funded = facade.funded_airlines_count().await;
                prop_assert!(funded <= registered);
                prop_assert!(registered <= exist);
                prop_assert_eq!(facade.escrow_balance().await, balance(&ledger, "surety-escrow"));
                prop_assert!(facade.verify_journal().await);
            }
            Ok(())
        })?;
    }
}
