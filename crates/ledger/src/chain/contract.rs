//! Bindings for the AnnSuraksha supply-chain contract.

use alloy::sol;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract SupplyChain {
        function logDelivery(address beneficiary, bytes fpsCode, bytes location, uint256 amount, string ipfsHash) external;
        function confirmDelivery(uint256 deliveryId) external;
        function fileComplaint(uint256 deliveryId, string reason) external;
        function resolveDispute(uint256 deliveryId, bool dealerAtFault) external;
        function setDealerAuthorization(address dealer, bool authorized) external;

        function createProposal(address target, bytes payload, string description) external;
        function castVote(uint256 proposalId, bool support) external;
        function executeProposal(uint256 proposalId) external;

        function nextDeliveryId() external view returns (uint256);
        function deliveries(uint256 deliveryId) external view returns (
            address dealer,
            address beneficiary,
            bytes fpsCode,
            bytes location,
            uint256 amount,
            uint256 deliveryTime,
            uint256 collectionTime,
            uint8 status,
            string ipfsHash
        );
        function proposals(uint256 proposalId) external view returns (
            address target,
            bytes payload,
            string description,
            uint256 voteEnd,
            uint256 forVotes,
            uint256 againstVotes,
            bool executed
        );
        function dealerReputation(address dealer) external view returns (uint256);

        event DeliveryLogged(
            uint256 indexed deliveryId,
            address indexed dealer,
            address indexed beneficiary,
            uint256 amount
        );
    }
}
