//! Dispatch markers for the standard membership resources.
//!
//! Collection links inside a service payload carry no type annotation of
//! their own, so they dispatch under the owning resource's type with the
//! link's relative path — these handlers claim those keys.

use async_trait::async_trait;

use crate::registry::Handler;

macro_rules! collection_handler {
    ($name:ident, $display:literal, $($key:literal),+) => {
        pub struct $name;

        #[async_trait]
        impl Handler for $name {
            fn name(&self) -> &'static str {
                $display
            }

            fn detours(&self) -> &'static [&'static str] {
                &[$($key),+]
            }
        }
    };
}

collection_handler!(
    AccountCollectionHandler,
    "ManagerAccountCollection",
    "#AccountService..AccountService/Accounts"
);
collection_handler!(
    ChassisCollectionHandler,
    "ChassisCollection",
    "#ServiceRoot..ServiceRoot/Chassis"
);
collection_handler!(
    JobCollectionHandler,
    "JobCollection",
    "#JobService..JobService/Jobs"
);
collection_handler!(
    ManagerCollectionHandler,
    "ManagerCollection",
    "#ServiceRoot..ServiceRoot/Managers"
);
collection_handler!(
    SessionCollectionHandler,
    "SessionCollection",
    "#SessionService..SessionService/Sessions"
);
collection_handler!(
    SystemsCollectionHandler,
    "SystemsCollection",
    "#ServiceRoot..ServiceRoot/Systems"
);
collection_handler!(
    TaskCollectionHandler,
    "TaskCollection",
    "#TaskService..TaskService/Tasks"
);
