use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, NameOrAddress, Signature, U256};
use ethers::utils::rlp::Rlp;

use custody_lp::{
    DeviceSigner, Error, LocalCustody, LocalSigner, SignedTransaction, Signer, TransactionIntent,
};

/// Test data builders and collaborator fakes
mod test_data {
    use super::*;
    use async_trait::async_trait;
    use custody_lp::{
        DeviceAddress, DeviceConnector, DeviceCustody, DeviceError, DeviceSignature,
        DeviceTransport, EthApp, FeeSuggestions, NetworkOracle, OracleError, ResolutionConfig,
        TransactionHandle,
    };
    use ethers::types::{Bytes, H256};
    use ethers::utils::keccak256;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // Keys were randomly generated for testing and shouldn't be used with any real funds
    pub const LOCAL_KEY: &str = "e908f86dbb4d55ac876378565aafeabc187f6690f046459397b17d9b9a19688e";
    pub const DEVICE_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    pub const CHAIN_ID: u64 = 8453;

    #[derive(Default)]
    pub struct MockOracle {
        pub transaction_count: u64,
        pub fail_transaction_count: bool,
        pub reject_broadcast: Option<String>,
        pub chain_id_calls: AtomicUsize,
        pub transaction_count_calls: AtomicUsize,
        pub estimate_calls: AtomicUsize,
        pub fee_calls: AtomicUsize,
        pub broadcasts: Mutex<Vec<Bytes>>,
    }

    impl MockOracle {
        pub fn with_transaction_count(count: u64) -> Self {
            Self {
                transaction_count: count,
                ..Default::default()
            }
        }

        pub fn calls(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NetworkOracle for MockOracle {
        async fn chain_id(&self) -> Result<u64, OracleError> {
            self.chain_id_calls.fetch_add(1, Ordering::SeqCst);
            Ok(CHAIN_ID)
        }

        async fn transaction_count(&self, _address: Address) -> Result<U256, OracleError> {
            self.transaction_count_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_transaction_count {
                return Err(OracleError::Unavailable("connection refused".to_string()));
            }
            Ok(U256::from(self.transaction_count))
        }

        async fn estimate_gas(&self, _request: &TypedTransaction) -> Result<U256, OracleError> {
            self.estimate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(U256::from(65_000u64))
        }

        async fn fee_suggestions(&self) -> Result<FeeSuggestions, OracleError> {
            self.fee_calls.fetch_add(1, Ordering::SeqCst);
            Ok(FeeSuggestions {
                max_fee_per_gas: Some(U256::from(2_000_000_000u64)),
                max_priority_fee_per_gas: Some(U256::from(1_000_000u64)),
            })
        }

        async fn broadcast_raw(&self, raw: Bytes) -> Result<TransactionHandle, OracleError> {
            if let Some(reason) = &self.reject_broadcast {
                return Err(OracleError::Rejected(reason.clone()));
            }
            let hash = H256::from(keccak256(&raw));
            self.broadcasts.lock().unwrap().push(raw);
            Ok(TransactionHandle { hash })
        }
    }

    /// Shared state behind a fake hardware wallet
    pub struct DeviceState {
        pub wallet: LocalWallet,
        pub reject: AtomicBool,
        pub unavailable: AtomicBool,
        pub opens: AtomicUsize,
        pub closes: AtomicUsize,
        pub address_requests: AtomicUsize,
        pub payloads: Mutex<Vec<String>>,
        pub resolutions: Mutex<Vec<Option<ResolutionConfig>>>,
    }

    impl DeviceState {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                wallet: DEVICE_KEY.parse().unwrap(),
                reject: AtomicBool::new(false),
                unavailable: AtomicBool::new(false),
                opens: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
                address_requests: AtomicUsize::new(0),
                payloads: Mutex::new(Vec::new()),
                resolutions: Mutex::new(Vec::new()),
            })
        }
    }

    pub struct MockConnector(pub Arc<DeviceState>);
    pub struct MockTransport(Arc<DeviceState>);
    pub struct MockEthApp(Arc<DeviceState>);

    #[async_trait]
    impl DeviceTransport for MockTransport {
        async fn close(&mut self) -> Result<(), DeviceError> {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl DeviceConnector for MockConnector {
        type Transport = MockTransport;
        type App = MockEthApp;

        async fn open(&self) -> Result<MockTransport, DeviceError> {
            if self.0.unavailable.load(Ordering::SeqCst) {
                return Err(DeviceError::Unavailable("no device found".to_string()));
            }
            self.0.opens.fetch_add(1, Ordering::SeqCst);
            Ok(MockTransport(self.0.clone()))
        }

        fn app(&self, transport: &MockTransport) -> MockEthApp {
            MockEthApp(transport.0.clone())
        }
    }

    #[async_trait]
    impl EthApp for MockEthApp {
        async fn get_address(&mut self, _path: &str) -> Result<DeviceAddress, DeviceError> {
            self.0.address_requests.fetch_add(1, Ordering::SeqCst);
            Ok(DeviceAddress {
                public_key: String::new(),
                address: format!("{:?}", self.0.wallet.address()),
            })
        }

        async fn sign_transaction(
            &mut self,
            _path: &str,
            unsigned_hex: &str,
            resolution: Option<&ResolutionConfig>,
        ) -> Result<DeviceSignature, DeviceError> {
            self.0.payloads.lock().unwrap().push(unsigned_hex.to_string());
            self.0.resolutions.lock().unwrap().push(resolution.copied());
            if self.0.reject.load(Ordering::SeqCst) {
                return Err(DeviceError::Rejected);
            }
            let mut payload = vec![0x02];
            payload.extend(hex::decode(unsigned_hex).map_err(|e| DeviceError::Protocol(e.to_string()))?);
            let signature = self
                .0
                .wallet
                .sign_hash(H256::from(keccak256(&payload)))
                .map_err(|e| DeviceError::Protocol(e.to_string()))?;
            Ok(DeviceSignature {
                v: format!("{:02x}", signature.v - 27),
                r: hex_word(signature.r),
                s: hex_word(signature.s),
            })
        }
    }

    fn hex_word(value: U256) -> String {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        hex::encode(bytes)
    }

    pub fn local_signer(oracle: MockOracle) -> LocalSigner<MockOracle> {
        Signer::new(LocalCustody::from_private_key(LOCAL_KEY).unwrap(), oracle)
    }

    pub fn device_signer(state: &Arc<DeviceState>, oracle: MockOracle) -> DeviceSigner<MockConnector, MockOracle> {
        Signer::new(
            DeviceCustody::new(MockConnector(state.clone()), "44'/60'/0'/0/0"),
            oracle,
        )
    }

    pub fn transfer() -> TransactionIntent {
        TransactionIntent::transfer(Address::repeat_byte(0x42), U256::from(1_000u64))
    }
}

fn decode(signed: &SignedTransaction) -> (TypedTransaction, Signature) {
    TypedTransaction::decode_signed(&Rlp::new(&signed.raw_transaction)).unwrap()
}

/// Nonce tracking across consecutive signs
mod nonce_tests {
    use super::test_data::*;
    use super::*;

    #[tokio::test]
    async fn test_sequential_signs_query_network_once() {
        let mut signer = local_signer(MockOracle::with_transaction_count(5));

        let first = signer.sign_transaction(&transfer()).await.unwrap();
        let second = signer.sign_transaction(&transfer()).await.unwrap();

        assert_eq!(decode(&first).0.nonce(), Some(&U256::from(5u64)));
        assert_eq!(decode(&second).0.nonce(), Some(&U256::from(6u64)));
        assert_eq!(
            MockOracle::calls(&signer.get_provider().transaction_count_calls),
            1
        );
        assert_eq!(signer.session().next_nonce(), Some(U256::from(7u64)));
    }

    #[tokio::test]
    async fn test_explicit_nonce_overrides_tracking() {
        let mut signer = local_signer(MockOracle::with_transaction_count(20));
        signer.sign_transaction(&transfer()).await.unwrap();
        assert_eq!(signer.session().next_nonce(), Some(U256::from(21u64)));

        let explicit = signer.sign_transaction(&transfer().nonce(3u64)).await.unwrap();
        assert_eq!(decode(&explicit).0.nonce(), Some(&U256::from(3u64)));
        assert_eq!(signer.session().next_nonce(), Some(U256::from(4u64)));

        let next = signer.sign_transaction(&transfer()).await.unwrap();
        assert_eq!(decode(&next).0.nonce(), Some(&U256::from(4u64)));
    }

    #[tokio::test]
    async fn test_exhausted_nonces_are_errors_not_panics() {
        let mut signer = local_signer(MockOracle::with_transaction_count(1));
        signer.sign_transaction(&transfer()).await.unwrap();

        let err = signer
            .sign_transaction(&transfer().nonce(U256::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIntent { field: "nonce", .. }));
        assert_eq!(signer.session().next_nonce(), Some(U256::from(2u64)));

        let last = signer
            .sign_transaction(&transfer().nonce(u64::MAX - 1))
            .await
            .unwrap();
        assert_eq!(decode(&last).0.nonce(), Some(&U256::from(u64::MAX - 1)));
        assert_eq!(signer.session().next_nonce(), Some(U256::from(u64::MAX)));

        let err = signer.sign_transaction(&transfer()).await.unwrap_err();
        assert!(matches!(err, Error::ArithmeticOverflow("nonce")));

        let mut fresh = local_signer(MockOracle::with_transaction_count(u64::MAX));
        let err = fresh.sign_transaction(&transfer()).await.unwrap_err();
        assert!(matches!(err, Error::ArithmeticOverflow("nonce")));
        assert_eq!(fresh.session().next_nonce(), None);
    }

    #[tokio::test]
    async fn test_network_failure_leaves_session_untouched() {
        let oracle = MockOracle {
            fail_transaction_count: true,
            ..Default::default()
        };
        let mut signer = local_signer(oracle);

        let err = signer.sign_transaction(&transfer()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::NetworkUnavailable {
                operation: "transaction_count",
                ..
            }
        ));
        assert_eq!(signer.session().next_nonce(), None);
    }

    #[tokio::test]
    async fn test_fully_specified_intent_needs_no_network() {
        let mut signer = local_signer(MockOracle::default());
        let intent = transfer()
            .nonce(0u64)
            .chain_id(CHAIN_ID)
            .gas_limit(21_000u64)
            .max_fee_per_gas(3_000_000_000u64)
            .max_priority_fee_per_gas(1_000_000u64);

        signer.sign_transaction(&intent).await.unwrap();

        let oracle = signer.get_provider();
        assert_eq!(MockOracle::calls(&oracle.chain_id_calls), 0);
        assert_eq!(MockOracle::calls(&oracle.transaction_count_calls), 0);
        assert_eq!(MockOracle::calls(&oracle.estimate_calls), 0);
        assert_eq!(MockOracle::calls(&oracle.fee_calls), 0);
    }
}

/// Canonical encoding of the signed record
mod encoding_tests {
    use super::test_data::*;
    use super::*;

    #[tokio::test]
    async fn test_contract_creation_keeps_recipient_absent() {
        let mut signer = local_signer(MockOracle::default());
        let deploy = TransactionIntent::deploy(vec![0x60, 0x80, 0x60, 0x40, 0x52]);

        let signed = signer.sign_transaction(&deploy).await.unwrap();
        let (tx, _) = decode(&signed);
        assert!(tx.to().is_none());

        let to_zero = signer
            .sign_transaction(&TransactionIntent::transfer(Address::zero(), U256::one()))
            .await
            .unwrap();
        let (tx, _) = decode(&to_zero);
        assert_eq!(tx.to(), Some(&NameOrAddress::Address(Address::zero())));
    }

    #[tokio::test]
    async fn test_signature_recovers_local_address() {
        let mut signer = local_signer(MockOracle::default());
        let address = signer.get_address().await.unwrap();

        let signed = signer.sign_transaction(&transfer()).await.unwrap();
        assert!(signed.verify_hash());
        assert_eq!(signed.raw_transaction[0], 0x02);

        let (tx, signature) = decode(&signed);
        assert_eq!(signature.recover(tx.sighash()).unwrap(), address);
        assert_eq!(tx.chain_id().map(|id| id.as_u64()), Some(CHAIN_ID));
        assert_eq!(tx.value(), Some(&U256::from(1_000u64)));
    }

    #[tokio::test]
    async fn test_meaningless_creation_is_rejected_before_network() {
        let mut signer = local_signer(MockOracle::default());
        let err = signer
            .sign_transaction(&TransactionIntent::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIntent { field: "to", .. }));
        assert_eq!(MockOracle::calls(&signer.get_provider().chain_id_calls), 0);
        assert_eq!(signer.session().next_nonce(), None);
    }
}

/// Sign-and-broadcast
mod broadcast_tests {
    use super::test_data::*;
    use super::*;

    #[tokio::test]
    async fn test_send_returns_content_hash() {
        let mut signer = local_signer(MockOracle::default());
        let handle = signer.send_transaction(&transfer()).await.unwrap();

        let broadcasts = signer.get_provider().broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        let signed = SignedTransaction {
            raw_transaction: broadcasts[0].clone(),
            hash: handle.hash,
        };
        assert!(signed.verify_hash());
    }

    #[tokio::test]
    async fn test_broadcast_rejection_is_surfaced_verbatim() {
        let oracle = MockOracle {
            reject_broadcast: Some("nonce too low".to_string()),
            ..Default::default()
        };
        let mut signer = local_signer(oracle);

        match signer.send_transaction(&transfer()).await {
            Err(Error::RejectedByNetwork(message)) => assert_eq!(message, "nonce too low"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

/// Hardware device custody
mod device_tests {
    use super::test_data::*;
    use super::*;
    use custody_lp::{Backend, DeviceCustody, ResolutionConfig, UnsignedTransactionBuilder};
    use ethers::types::H256;
    use ethers::utils::keccak256;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_device_address_is_resolved_once() {
        let state = DeviceState::new();
        let mut signer = device_signer(&state, MockOracle::default());

        let first = signer.get_address().await.unwrap();
        let second = signer.get_address().await.unwrap();

        assert_eq!(first, state.wallet.address());
        assert_eq!(first, second);
        assert_eq!(state.address_requests.load(Ordering::SeqCst), 1);
        assert_eq!(state.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_device_signs_payload_without_type_byte() {
        let state = DeviceState::new();
        let mut signer = device_signer(&state, MockOracle::with_transaction_count(9));

        let signed = signer.sign_transaction(&transfer()).await.unwrap();

        let payload = {
            let payloads = state.payloads.lock().unwrap();
            assert_eq!(payloads.len(), 1);
            assert!(!payloads[0].starts_with("0x"));
            hex::decode(&payloads[0]).unwrap()
        };
        // RLP list header, not the 0x02 type byte
        assert!(payload[0] >= 0xc0);

        let mut typed = vec![0x02];
        typed.extend_from_slice(&payload);
        let digest = H256::from(keccak256(&typed));

        let (tx, signature) = decode(&signed);
        assert_eq!(digest, tx.sighash());
        assert_eq!(signature.recover(tx.sighash()).unwrap(), state.wallet.address());
        assert_eq!(tx.nonce(), Some(&U256::from(9u64)));
        assert_eq!(signer.session().next_nonce(), Some(U256::from(10u64)));

        let unsigned = UnsignedTransactionBuilder::new(signer.get_provider(), Backend::Device)
            .build(state.wallet.address(), &transfer().nonce(9u64), None)
            .await
            .unwrap();
        assert_eq!(unsigned.sighash(), digest);
        assert_eq!(unsigned.device_payload_hex(), hex::encode(&payload));
    }

    #[tokio::test]
    async fn test_resolution_config_is_forwarded_to_device() {
        let state = DeviceState::new();
        let resolution = ResolutionConfig {
            erc20: true,
            external_plugins: false,
            nft: false,
        };
        let mut signer = Signer::new(
            DeviceCustody::new(MockConnector(state.clone()), "44'/60'/0'/0/0")
                .with_resolution(resolution),
            MockOracle::default(),
        );
        signer.sign_transaction(&transfer()).await.unwrap();

        let mut plain = device_signer(&state, MockOracle::default());
        plain.sign_transaction(&transfer()).await.unwrap();

        assert_eq!(
            *state.resolutions.lock().unwrap(),
            vec![Some(resolution), None]
        );
    }

    #[tokio::test]
    async fn test_operator_rejection_keeps_nonce() {
        let state = DeviceState::new();
        let mut signer = device_signer(&state, MockOracle::with_transaction_count(2));
        signer.sign_transaction(&transfer()).await.unwrap();
        assert_eq!(signer.session().next_nonce(), Some(U256::from(3u64)));

        state.reject.store(true, Ordering::SeqCst);
        let err = signer.sign_transaction(&transfer()).await.unwrap_err();
        assert!(matches!(err, Error::UserRejected));
        assert_eq!(signer.session().next_nonce(), Some(U256::from(3u64)));

        signer.disconnect().await.unwrap();
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_device_is_unavailable() {
        let state = DeviceState::new();
        state.unavailable.store(true, Ordering::SeqCst);
        let mut signer = device_signer(&state, MockOracle::default());

        assert!(matches!(
            signer.get_address().await,
            Err(Error::DeviceUnavailable(_))
        ));
        assert!(matches!(
            signer.sign_transaction(&transfer()).await,
            Err(Error::DeviceUnavailable(_))
        ));
        assert_eq!(signer.session().next_nonce(), None);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_reconnects() {
        let state = DeviceState::new();
        let mut signer = device_signer(&state, MockOracle::default());

        signer.disconnect().await.unwrap();
        assert_eq!(state.closes.load(Ordering::SeqCst), 0);

        signer.connect().await.unwrap();
        signer.connect().await.unwrap();
        assert_eq!(state.opens.load(Ordering::SeqCst), 1);

        signer.disconnect().await.unwrap();
        signer.disconnect().await.unwrap();
        assert_eq!(state.closes.load(Ordering::SeqCst), 1);
        assert!(!signer.custody().is_connected());

        signer.sign_transaction(&transfer()).await.unwrap();
        assert_eq!(state.opens.load(Ordering::SeqCst), 2);
        signer.disconnect().await.unwrap();
        assert_eq!(state.closes.load(Ordering::SeqCst), 2);
    }
}
